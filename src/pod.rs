//! Pods, pod types, and the container that owns them and their communication topology.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PodError;

/// A uniquely identified service replica of a given type.
///
/// Immutable once created. The canonical id is `"{name}-{ordinal}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pod {
    /// The pod's type name.
    pub name: String,
    /// The pod's ordinal within its type.
    pub ordinal: u32,
}

impl Pod {
    /// Create a new pod of the given type.
    pub fn new(name: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }

    /// The canonical `"{name}-{ordinal}"` id of this pod.
    pub fn id(&self) -> String {
        format!("{}-{}", self.name, self.ordinal)
    }

    /// Parse a canonical id back into a [`Pod`].
    ///
    /// The split point is the *last* `-`, so type names containing hyphens (e.g. `"end-of-row"`)
    /// still round-trip correctly.
    pub fn from_id(id: &str) -> Result<Self, PodError> {
        let (name, ordinal) = id
            .rsplit_once('-')
            .ok_or_else(|| PodError::MalformedId(id.to_string()))?;
        let ordinal = ordinal
            .parse()
            .map_err(|_| PodError::MalformedId(id.to_string()))?;
        if name.is_empty() {
            return Err(PodError::MalformedId(id.to_string()));
        }
        Ok(Self::new(name, ordinal))
    }
}

/// Per-type configuration: how many pods of this type may be offline at once, and whether
/// restarting this type is costlier than average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodConfig {
    /// Maximum number of pods of this type allowed offline simultaneously. `None` means
    /// unbounded.
    #[serde(default)]
    pub redundancy: Option<u32>,
    /// Whether restarting a pod of this type incurs extra cost in the planner's objective.
    #[serde(default)]
    pub major: bool,
}

impl PodConfig {
    /// A config with a fixed redundancy cap and major flag.
    pub fn new(redundancy: Option<u32>, major: bool) -> Self {
        Self { redundancy, major }
    }
}

/// An insertion-ordered mapping of pod id to [`Pod`], together with per-type configuration and an
/// undirected communication topology between types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodContainer {
    pods: IndexMap<String, Pod>,
    /// Per-type configuration. Types absent from this map default to "no redundancy, not major".
    #[serde(default)]
    pub configs: BTreeMap<String, PodConfig>,
    /// Unordered pairs of type names that may communicate, stored with stable (sorted) ordering.
    #[serde(default)]
    topo: BTreeSet<(String, String)>,
}

impl PodContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one or more pods. Errors if any id is already present.
    pub fn add_pod(&mut self, pod: Pod) -> Result<(), PodError> {
        let id = pod.id();
        if self.pods.contains_key(&id) {
            return Err(PodError::DuplicatePod(id));
        }
        self.pods.insert(id, pod);
        Ok(())
    }

    /// Add several pods at once, in order.
    pub fn add_pods(&mut self, pods: impl IntoIterator<Item = Pod>) -> Result<(), PodError> {
        for pod in pods {
            self.add_pod(pod)?;
        }
        Ok(())
    }

    /// Look up a pod by canonical id.
    pub fn get(&self, id: &str) -> Option<&Pod> {
        self.pods.get(id)
    }

    /// Whether a pod with this id exists in the container.
    pub fn contains(&self, id: &str) -> bool {
        self.pods.contains_key(id)
    }

    /// The number of pods in the container.
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Iterate over pods in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pod)> {
        self.pods.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add an unordered communication edge between `name` and each of `others`, sorted so that
    /// `(a, b)` and `(b, a)` always compare equal.
    pub fn connect(&mut self, name: &str, others: &[&str]) {
        for other in others {
            let pair = if name <= *other {
                (name.to_string(), other.to_string())
            } else {
                (other.to_string(), name.to_string())
            };
            self.topo.insert(pair);
        }
    }

    /// Whether two pods' *types* are connected in the topology. Direction-insensitive.
    pub fn is_connected(&self, pid1: &str, pid2: &str) -> Result<bool, PodError> {
        let p1 = Pod::from_id(pid1)?;
        let p2 = Pod::from_id(pid2)?;
        let pair = if p1.name <= p2.name {
            (p1.name, p2.name)
        } else {
            (p2.name, p1.name)
        };
        Ok(self.topo.contains(&pair))
    }

    /// Group pods by type, preserving insertion order within each group.
    pub fn types(&self) -> IndexMap<String, Vec<&Pod>> {
        let mut result: IndexMap<String, Vec<&Pod>> = IndexMap::new();
        for pod in self.pods.values() {
            result.entry(pod.name.clone()).or_default().push(pod);
        }
        result
    }

    /// The set of type names configured as `major`.
    pub fn major_types(&self) -> BTreeSet<String> {
        self.configs
            .iter()
            .filter(|(_, c)| c.major)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The config for a type, defaulting to "no redundancy, not major" for unknown types.
    pub fn config(&self, name: &str) -> PodConfig {
        self.configs.get(name).copied().unwrap_or_default()
    }
}
