//! Healing batches and the planner's output.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionState;
use crate::pod::{Pod, PodContainer};

/// A set of pods to restart together, in presentational order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// The pods in this batch, in the order they were assigned.
    pub pods: Vec<Pod>,
}

impl Batch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// The weak edges covered by this batch: every edge of `state` with at least one endpoint in
    /// this batch.
    pub fn covered_edges(&self, state: &ConnectionState) -> BTreeSet<(String, String)> {
        let ids: BTreeSet<String> = self.pods.iter().map(|p| p.id()).collect();
        state
            .edges()
            .into_iter()
            .filter(|(s, t)| ids.contains(s) || ids.contains(t))
            .collect()
    }

    /// The ids of this batch's pods whose type is configured `major`.
    pub fn majors(&self, pods: &PodContainer) -> Vec<String> {
        let major_types = pods.major_types();
        self.pods
            .iter()
            .filter(|p| major_types.contains(&p.name))
            .map(|p| p.id())
            .collect()
    }

    /// Whether this batch respects every type's redundancy cap.
    pub fn valid(&self, pods: &PodContainer) -> bool {
        let mut counts: std::collections::BTreeMap<&str, u32> = std::collections::BTreeMap::new();
        for pod in &self.pods {
            *counts.entry(pod.name.as_str()).or_insert(0) += 1;
        }
        counts.into_iter().all(|(name, count)| match pods.config(name).redundancy {
            Some(r) => count <= r,
            None => true,
        })
    }
}

/// Resource-usage summary of one planner invocation, populated by an external caller -- the
/// planner never measures its own wall time or memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    /// Wall-clock time of the planning run.
    pub wall_time: Option<Duration>,
    /// CPU utilization percentage during the run.
    pub cpu_percent: Option<f64>,
    /// Peak resident set size, in kilobytes.
    pub peak_rss_kb: Option<u64>,
}

/// The planner's output: a connection state and the ordered batches that heal it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// The connection state this solution was planned against.
    pub state: ConnectionState,
    /// The ordered healing batches.
    pub batches: Vec<Batch>,
    /// Resource usage of the run that produced this solution, if measured externally.
    pub status: ExecutionStatus,
}

impl Solution {
    /// Create a solution with no resource-usage information attached.
    pub fn new(state: ConnectionState, batches: Vec<Batch>) -> Self {
        Self {
            state,
            batches,
            status: ExecutionStatus::default(),
        }
    }

    /// The union of every batch's covered edges.
    pub fn covered_edges(&self) -> BTreeSet<(String, String)> {
        self.batches
            .iter()
            .flat_map(|b| b.covered_edges(&self.state))
            .collect()
    }

    /// The union of every batch's major pod ids.
    pub fn majors(&self) -> BTreeSet<String> {
        self.batches
            .iter()
            .flat_map(|b| b.majors(&self.state.pods))
            .collect()
    }

    /// The union of every pod id scheduled for restart across all batches.
    pub fn pods(&self) -> BTreeSet<String> {
        self.batches
            .iter()
            .flat_map(|b| b.pods.iter().map(|p| p.id()))
            .collect()
    }

    /// The quality tuple used to compare solutions: `(covered_edges, #batches, #majors,
    /// #restarted_pods)`. Smaller is better on the last three; larger is better on the first.
    pub fn evaluated(&self) -> (usize, usize, usize, usize) {
        (
            self.covered_edges().len(),
            self.batches.len(),
            self.majors().len(),
            self.pods().len(),
        )
    }

    /// Whether every batch in this solution respects its type redundancy caps.
    pub fn valid(&self) -> bool {
        self.batches.iter().all(|b| b.valid(&self.state.pods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{Pod, PodConfig};

    fn two_a_pods_redundancy_one() -> (PodContainer, ConnectionState) {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("b", 0)])
            .unwrap();
        pods.configs.insert("a".to_string(), PodConfig::new(Some(1), false));
        let mut state = ConnectionState::new(pods.clone());
        state.add_weak("a-0", "b-0").unwrap();
        (pods, state)
    }

    #[test]
    fn batch_exceeding_redundancy_is_invalid() {
        let (pods, _state) = two_a_pods_redundancy_one();
        let batch = Batch {
            pods: vec![Pod::new("a", 0), Pod::new("a", 1)],
        };
        assert!(!batch.valid(&pods));
    }

    #[test]
    fn batch_within_redundancy_is_valid() {
        let (pods, _state) = two_a_pods_redundancy_one();
        let batch = Batch {
            pods: vec![Pod::new("a", 0)],
        };
        assert!(batch.valid(&pods));
    }

    #[test]
    fn covered_edges_requires_an_endpoint_in_the_batch() {
        let (_, state) = two_a_pods_redundancy_one();
        let batch = Batch {
            pods: vec![Pod::new("b", 0)],
        };
        assert_eq!(batch.covered_edges(&state).len(), 1);

        let empty_batch = Batch { pods: vec![] };
        assert_eq!(empty_batch.covered_edges(&state).len(), 0);
    }

    #[test]
    fn evaluated_tuple_aggregates_across_batches() {
        let (_, state) = two_a_pods_redundancy_one();
        let solution = Solution::new(
            state,
            vec![
                Batch { pods: vec![Pod::new("a", 0)] },
                Batch { pods: vec![Pod::new("a", 1)] },
            ],
        );
        assert_eq!(solution.evaluated(), (1, 2, 0, 2));
    }

    #[test]
    fn solution_round_trips_through_serde() {
        let (_, state) = two_a_pods_redundancy_one();
        let mut solution = Solution::new(
            state,
            vec![
                Batch { pods: vec![Pod::new("a", 0)] },
                Batch { pods: vec![Pod::new("a", 1)] },
            ],
        );
        solution.status = ExecutionStatus {
            wall_time: Some(Duration::from_millis(1500)),
            cpu_percent: Some(87.5),
            peak_rss_kb: Some(204800),
        };

        let json = serde_json::to_string(&solution).unwrap();
        let reloaded: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, solution);
    }
}
