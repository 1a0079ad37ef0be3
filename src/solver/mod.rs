//! The batch planner: finds the fewest redundancy-respecting batches that maximally cover a
//! connection state's weak edges.

pub mod formulation;

use std::collections::BTreeMap;

use log::{info, warn};

use crate::connection::ConnectionState;
use crate::error::PlannerError;
use crate::pod::Pod;
use crate::solution::{Batch, Solution};

/// Something that can turn a connection state into a healing plan.
pub trait Solver {
    /// Plan a solution for `state`.
    fn solve(&self, state: &ConnectionState) -> Result<Solution, PlannerError>;
}

/// Solves the single-batch selection problem directly: every restarted pod goes into one batch,
/// ignoring the batch's own redundancy compliance (the caller is expected to split it further, as
/// [`CIPMultipleBatchSolver`] does).
#[derive(Debug, Clone, Copy, Default)]
pub struct CIPSingleBatchSolver;

impl Solver for CIPSingleBatchSolver {
    fn solve(&self, state: &ConnectionState) -> Result<Solution, PlannerError> {
        let pods = formulation::solve_selection(state)?;
        Ok(Solution::new(state.clone(), vec![Batch { pods }]))
    }
}

/// Finds the fewest batches that cover as many weak edges as a single unconstrained batch would,
/// then splits the selection into batches that each individually respect redundancy.
///
/// Delegates the per-trial selection problem to an inner [`Solver`] (dependency injection via
/// constructor), defaulting to [`CIPSingleBatchSolver`].
pub struct CIPMultipleBatchSolver<S: Solver = CIPSingleBatchSolver> {
    inner: S,
}

impl CIPMultipleBatchSolver<CIPSingleBatchSolver> {
    /// A planner backed by the default single-batch CIP solver.
    pub fn new() -> Self {
        Self {
            inner: CIPSingleBatchSolver,
        }
    }
}

impl Default for CIPMultipleBatchSolver<CIPSingleBatchSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Solver> std::fmt::Debug for CIPMultipleBatchSolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CIPMultipleBatchSolver").finish_non_exhaustive()
    }
}

impl<S: Solver> CIPMultipleBatchSolver<S> {
    /// A planner backed by a caller-supplied single-batch solver (for tests or alternate
    /// backends).
    pub fn with_solver(inner: S) -> Self {
        Self { inner }
    }

    fn solve_with_scaled_redundancy(&self, state: &ConnectionState, k: u32) -> Result<Solution, PlannerError> {
        let mut scaled = state.clone();
        for config in scaled.pods.configs.values_mut() {
            if let Some(r) = config.redundancy {
                config.redundancy = Some(r * k);
            }
        }
        self.inner.solve(&scaled)
    }
}

/// `max(1, max over bounded types of ceil(|type| / redundancy))`. Unbounded types and types with
/// a redundancy of `0` (permanently excluded from any selection) do not contribute.
fn k_hi(state: &ConnectionState) -> u32 {
    let types = state.pods.types();
    let bound = state
        .pods
        .configs
        .iter()
        .filter_map(|(name, config)| {
            let r = config.redundancy?;
            if r == 0 {
                return None;
            }
            let count = types.get(name).map(|pods| pods.len()).unwrap_or(0);
            Some((count as f64 / r as f64).ceil() as u32)
        })
        .max()
        .unwrap_or(1);
    bound.max(1)
}

/// Group `selected` by type and spread each type's pods round-batch in runs of its redundancy
/// cap; unbounded (or zero-redundancy) types collect entirely into batch 0.
fn split_into_batches(selected: &[Pod], state: &ConnectionState, k: u32) -> Result<Vec<Batch>, PlannerError> {
    let mut batches: Vec<Vec<Pod>> = vec![Vec::new(); k.max(1) as usize];

    let mut by_type: BTreeMap<&str, Vec<&Pod>> = BTreeMap::new();
    for pod in selected {
        by_type.entry(pod.name.as_str()).or_default().push(pod);
    }

    for (name, pods) in by_type {
        match state.pods.config(name).redundancy {
            Some(r) if r > 0 => {
                for (i, pod) in pods.iter().enumerate() {
                    let batch_idx = i / r as usize;
                    if batch_idx >= batches.len() {
                        return Err(PlannerError::Invariant(format!(
                            "type '{name}' needs more than k={k} batches at redundancy {r}"
                        )));
                    }
                    batches[batch_idx].push((*pod).clone());
                }
            }
            _ => {
                for pod in pods {
                    batches[0].push((*pod).clone());
                }
            }
        }
    }

    Ok(batches.into_iter().map(|pods| Batch { pods }).collect())
}

impl<S: Solver> Solver for CIPMultipleBatchSolver<S> {
    fn solve(&self, state: &ConnectionState) -> Result<Solution, PlannerError> {
        let hi = k_hi(state);
        info!("planning batches: K_hi = {hi}");

        let ceiling = self.solve_with_scaled_redundancy(state, hi)?;
        let max_covered = ceiling.covered_edges().len();
        info!("k={hi} covers {max_covered} edges (coverage ceiling)");

        let mut lo = 1u32;
        let mut hi_bound = hi;
        let mut best = ceiling;
        while lo < hi_bound {
            let mid = lo + (hi_bound - lo) / 2;
            let trial = self.solve_with_scaled_redundancy(state, mid)?;
            let covered = trial.covered_edges().len();
            info!("binary search trial k={mid} covers {covered}/{max_covered} edges");
            if covered >= max_covered {
                hi_bound = mid;
                best = trial;
            } else {
                lo = mid + 1;
            }
        }
        let k_star = hi_bound;

        let total_edges = state.edges().len();
        if max_covered < total_edges {
            warn!("coverage shortfall: {max_covered}/{total_edges} weak edges covered even at K_hi");
        }

        let selected = &best.batches[0].pods;
        let batches = split_into_batches(selected, state, k_star)?;

        if batches.len() != k_star as usize {
            return Err(PlannerError::Invariant(format!(
                "split produced {} batches, expected {k_star}",
                batches.len()
            )));
        }
        let solution = Solution::new(state.clone(), batches);
        if !solution.valid() {
            return Err(PlannerError::Invariant(
                "a split batch failed redundancy validity".to_string(),
            ));
        }

        info!("final plan: {} batches covering {} edges", solution.batches.len(), max_covered);
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::pod::{Pod, PodConfig, PodContainer};

    #[test]
    fn tiny_covering_selects_one_major_pod_in_one_batch() {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("b", 0)])
            .unwrap();
        pods.configs.insert("a".into(), PodConfig::new(Some(1), false));
        pods.configs.insert("b".into(), PodConfig::new(Some(1), true));

        let mut state = ConnectionState::new(pods);
        state.add_weak("a-0", "b-0").unwrap();
        state.add_weak("a-1", "b-0").unwrap();

        let planner = CIPMultipleBatchSolver::new();
        let solution = planner.solve(&state).unwrap();

        assert_eq!(solution.batches.len(), 1);
        assert_eq!(solution.pods(), BTreeSet::from(["b-0".to_string()]));
        assert_eq!(solution.covered_edges().len(), 2);
    }

    #[test]
    fn forced_batching_by_redundancy_splits_a_clique() {
        let mut pods = PodContainer::new();
        pods.add_pods([
            Pod::new("sm2", 0),
            Pod::new("sm2", 1),
            Pod::new("sm2", 2),
            Pod::new("sm2", 3),
        ])
        .unwrap();
        pods.configs.insert("sm2".into(), PodConfig::new(Some(2), false));

        let mut state = ConnectionState::new(pods);
        let ids = ["sm2-0", "sm2-1", "sm2-2", "sm2-3"];
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                state.add_weak(ids[i], ids[j]).unwrap();
            }
        }

        let planner = CIPMultipleBatchSolver::new();
        let solution = planner.solve(&state).unwrap();

        // A single batch is capped at redundancy 2, but covering the whole clique needs at least
        // 3 of the 4 pods selected (any 3 touch every edge), so 2 batches are required.
        assert_eq!(solution.batches.len(), 2);
        assert!(solution.valid());
        assert_eq!(solution.covered_edges().len(), state.edges().len());
    }

    #[test]
    fn unbounded_type_collects_into_batch_zero() {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("b", 0), Pod::new("b", 1)])
            .unwrap();
        pods.configs.insert("a".into(), PodConfig::new(Some(1), false));
        // "b" has no configured redundancy: unbounded.

        let mut state = ConnectionState::new(pods);
        state.add_weak("a-0", "b-0").unwrap();
        state.add_weak("a-1", "b-1").unwrap();

        let planner = CIPMultipleBatchSolver::new();
        let solution = planner.solve(&state).unwrap();

        let b_batch_indices: Vec<usize> = solution
            .batches
            .iter()
            .enumerate()
            .filter(|(_, batch)| batch.pods.iter().any(|p| p.name == "b"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(b_batch_indices, vec![0]);
    }

    #[test]
    fn idempotent_across_repeated_runs() {
        let mut pods = PodContainer::new();
        pods.add_pods([Pod::new("a", 0), Pod::new("a", 1), Pod::new("b", 0)])
            .unwrap();
        pods.configs.insert("a".into(), PodConfig::new(Some(1), false));

        let mut state = ConnectionState::new(pods);
        state.add_weak("a-0", "b-0").unwrap();
        state.add_weak("a-1", "b-0").unwrap();
        let original = state.clone();

        let planner = CIPMultipleBatchSolver::new();
        let first = planner.solve(&state).unwrap();
        let second = planner.solve(&state).unwrap();

        assert_eq!(first.evaluated(), second.evaluated());
        assert_eq!(state.pairs(), original.pairs());
    }
}
