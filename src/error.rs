//! Typed error hierarchy for every fallible boundary in this crate.

use thiserror::Error;

use crate::network::EndpointRef;

/// Error raised while building or querying a [`crate::pod::PodContainer`].
#[derive(Debug, Clone, Error)]
pub enum PodError {
    /// A pod id does not parse as `"{name}-{ordinal}"`.
    #[error("pod id '{0}' is not of the form 'name-ordinal'")]
    MalformedId(String),
    /// A pod with this id was already present in the container.
    #[error("duplicate pod id '{0}'")]
    DuplicatePod(String),
    /// A pod id was referenced but is not present in the container.
    #[error("unknown pod '{0}'")]
    UnknownPod(String),
}

/// Error raised while building or freezing a [`crate::network::Network`].
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// A device with this id was already present in the topology.
    #[error("duplicate device id '{0}'")]
    DuplicateDevice(String),
    /// A device id was referenced but is not present in the topology.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
    /// A port index is out of range for the device's port count.
    #[error("port {port} out of range for device '{device}' with {count} ports")]
    PortOutOfRange {
        /// The device whose port was addressed.
        device: String,
        /// The offending port index.
        port: u32,
        /// The device's total port count.
        count: u32,
    },
    /// A port already participates in a cable.
    #[error("port '{0}' is already cabled")]
    PortAlreadyCabled(String),
    /// A pod was bound to a device that does not exist.
    #[error("pod '{pod}' bound to unknown device '{device}'")]
    UnboundDevice {
        /// The pod being bound.
        pod: String,
        /// The missing device.
        device: String,
    },
    /// `turn`/`on`/`off` referenced an endpoint absent from the frozen index.
    #[error("unknown endpoint {0:?}")]
    UnknownEndpoint(EndpointRef),
    /// A pod referenced by the network is not part of the pod container.
    #[error(transparent)]
    Pod(#[from] PodError),
}

/// Error raised while loading a declarative scenario manifest.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The manifest failed to parse as TOML.
    #[error("malformed scenario manifest: {0}")]
    Manifest(#[from] toml::de::Error),
    /// The manifest described an invalid pod container.
    #[error(transparent)]
    Pod(#[from] PodError),
    /// The manifest described an invalid network.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// A weak edge in the manifest referenced a pod not present in the container.
    #[error("weak connection references unknown pod '{0}'")]
    UnknownWeakEndpoint(String),
    /// A probability-generator request was made but the manifest declared no network.
    #[error("probability-generator request requires a [network] section")]
    MissingNetwork,
}

/// Error raised by the backing integer-programming solver.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The solver could not find a feasible assignment.
    #[error("solver reported infeasible problem")]
    Infeasible,
    /// The solver backend itself failed (e.g. could not start, timed out).
    #[error("solver backend failure: {0}")]
    Backend(String),
    /// A returned variable value was not within the rounding tolerance of 0 or 1.
    #[error("solver returned a fractional assignment {0} outside the rounding tolerance")]
    FractionalAssignment(f64),
}

/// Error raised by the batch planner.
#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    /// A solver trial failed outright (distinct from an infeasible/low-coverage trial).
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// An internal invariant was violated (split produced the wrong batch count, or a batch
    /// failed validity after splitting). Indicates a bug in the planner, not a bad input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
