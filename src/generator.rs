//! Synthesizes [`ConnectionState`]s, either from network-derived probabilities or from scratch
//! for ad hoc test fixtures.

use std::collections::BTreeMap;

use itertools::Itertools;
use rand::Rng;

use crate::connection::ConnectionState;
use crate::error::NetworkError;
use crate::network::FreezedNetwork;
use crate::pod::{Pod, PodContainer};

/// Canonicalize an unordered pod pair into a stable lexicographic key, so storage and lookup
/// never disagree regardless of the order pods were visited in.
fn sorted_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Derives, per unordered pod pair, the fraction of shortest paths currently weak, and samples
/// directed weak connections from those probabilities.
pub struct ProbabilityConnectionStateGenerator {
    pods: PodContainer,
    probabilities: BTreeMap<(String, String), f64>,
}

impl ProbabilityConnectionStateGenerator {
    /// Derive one probability per unordered pair of pods in the network, from its current
    /// `(healthy, weak)` path split.
    pub fn from_network(freezed: &FreezedNetwork) -> Result<Self, NetworkError> {
        let ids: Vec<String> = freezed.pods().iter().map(|(id, _)| id.to_string()).collect();
        let mut probabilities = BTreeMap::new();
        for pair in ids.iter().combinations(2) {
            let (a, b) = (pair[0], pair[1]);
            let (healthy, weak) = freezed.state(a, b)?;
            let total = healthy.len() + weak.len();
            let p = if total == 0 {
                0.0
            } else {
                weak.len() as f64 / total as f64
            };
            probabilities.insert(sorted_key(a, b), p);
        }
        Ok(Self {
            pods: freezed.pods().clone(),
            probabilities,
        })
    }

    /// The derived probability for an unordered pair, if both pods were present at construction.
    pub fn probability(&self, a: &str, b: &str) -> Option<f64> {
        self.probabilities.get(&sorted_key(a, b)).copied()
    }

    /// Sample a [`ConnectionState`]: for each pair `(s, t)` with probability `p`, draw two
    /// independent Bernoulli trials, adding `s -> t` on the first success and `t -> s` on the
    /// second.
    pub fn generate(&self) -> ConnectionState {
        let mut rng = rand::thread_rng();
        let mut result = ConnectionState::new(self.pods.clone());
        for ((s, t), &p) in &self.probabilities {
            if rng.gen_bool(p) {
                result.add_weak(s, t).expect("pair drawn from this generator's own pods");
            }
            if rng.gen_bool(p) {
                result.add_weak(t, s).expect("pair drawn from this generator's own pods");
            }
        }
        result
    }
}

/// Builds arbitrary pods and weak connections without reference to any network, for synthetic
/// test fixtures and the `generate` CLI command when no network is supplied.
pub struct RandomConnectionStateGenerator;

impl RandomConnectionStateGenerator {
    /// Generate `pod_count` pods spread across `type_count` randomly-chosen type names, then
    /// assign each resulting type a `major` flag (with probability `major_rate`) and a concrete
    /// redundancy cap drawn uniformly from `0..=max(0, #types - 1)`.
    pub fn pods(pod_count: u32, type_count: u32, major_rate: f64) -> PodContainer {
        let mut rng = rand::thread_rng();
        let mut pods = PodContainer::new();
        for i in 0..pod_count {
            let type_name = format!("type{}", rng.gen_range(0..type_count));
            pods.add_pod(Pod::new(type_name, i))
                .expect("ordinal i is unique per iteration");
        }

        let type_names: Vec<String> = pods.types().keys().cloned().collect();
        let redundancy_bound = type_names.len().saturating_sub(1).max(0) as u32;
        for name in &type_names {
            let major = rng.gen_bool(major_rate);
            let redundancy = if redundancy_bound == 0 {
                0
            } else {
                rng.gen_range(0..=redundancy_bound)
            };
            pods.configs
                .insert(name.clone(), crate::pod::PodConfig::new(Some(redundancy), major));
        }
        pods
    }

    /// Add `weaks` randomly-directed weak connections between randomly-chosen pods of
    /// randomly-chosen (possibly identical) types. Requires at least two pod types.
    pub fn state(state: &mut ConnectionState, weaks: u32) -> Result<(), crate::error::PodError> {
        let groups: Vec<Vec<String>> = state
            .pods
            .types()
            .values()
            .map(|pods| pods.iter().map(|p| p.id()).collect())
            .collect();
        assert!(groups.len() > 1, "must have more than one pod type");

        let mut rng = rand::thread_rng();
        for _ in 0..weaks {
            let group1 = &groups[rng.gen_range(0..groups.len())];
            let group2 = &groups[rng.gen_range(0..groups.len())];
            let p1 = &group1[rng.gen_range(0..group1.len())];
            let p2 = &group2[rng.gen_range(0..group2.len())];
            state.add_weak(p1, p2)?;
        }
        Ok(())
    }
}
