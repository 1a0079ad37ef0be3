//! Directed weak-connection state between pods.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PodError;
use crate::pod::PodContainer;

/// A snapshot of which directed pod pairs are currently reporting a weak connection.
///
/// Duplicates in a source's target list are permitted -- they arise naturally from the probability
/// generator sampling each direction independently over repeated runs against the same pair -- and
/// are collapsed wherever set semantics are needed ([`ConnectionState::edges`]). Callers that want
/// the raw, possibly-repeated listing use [`ConnectionState::pairs`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// The pods this state is defined over.
    pub pods: PodContainer,
    weak_edges: IndexMap<String, Vec<String>>,
}

impl ConnectionState {
    /// An empty connection state over the given pods.
    pub fn new(pods: PodContainer) -> Self {
        Self {
            pods,
            weak_edges: IndexMap::new(),
        }
    }

    /// Record a directed weak connection `source -> target`. Errors if either pod is unknown.
    pub fn add_weak(&mut self, source: &str, target: &str) -> Result<(), PodError> {
        if !self.pods.contains(source) {
            return Err(PodError::UnknownPod(source.to_string()));
        }
        if !self.pods.contains(target) {
            return Err(PodError::UnknownPod(target.to_string()));
        }
        self.weak_edges
            .entry(source.to_string())
            .or_default()
            .push(target.to_string());
        Ok(())
    }

    /// The raw (possibly repeated) targets reported weak from `source`.
    pub fn weaks(&self, source: &str) -> &[String] {
        self.weak_edges
            .get(source)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every directed `(source, target)` pair, with multiplicity, in insertion order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.weak_edges
            .iter()
            .flat_map(|(source, targets)| {
                targets.iter().map(move |target| (source.clone(), target.clone()))
            })
            .collect()
    }

    /// The deduplicated set of directed weak edges.
    pub fn edges(&self) -> BTreeSet<(String, String)> {
        self.pairs().into_iter().collect()
    }

    /// Whether this state has no weak connections at all.
    pub fn is_empty(&self) -> bool {
        self.weak_edges.values().all(|v| v.is_empty())
    }
}
