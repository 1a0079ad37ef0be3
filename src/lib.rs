//! # podheal
//!
//! Plans how to restart a fleet of pods in the fewest redundancy-respecting batches, given a set
//! of directed weak connections between them.
//!
//! ## Structure
//! - [`pod`] defines the typed domain model: pods, per-type redundancy/major configuration, and
//!   the communication topology between types.
//! - [`network`] models the physical devices, cables, and pod bindings, and precomputes
//!   all-pairs shortest paths once the network is frozen ([`network::FreezedNetwork`]).
//! - [`connection`] is the directed weak-connection snapshot the planner consumes.
//! - [`generator`] derives weak-connection probabilities from a frozen network and samples
//!   connection states from them (or builds synthetic ones for tests).
//! - [`solver`] builds and solves the integer program selecting which pods to restart
//!   ([`solver::formulation`]), and the batch planner that wraps it
//!   ([`solver::CIPMultipleBatchSolver`]).
//! - [`solution`] is the planner's output: batches and the derived coverage/quality metrics.
//! - [`scenario`] loads a declarative TOML manifest describing pods, a network, and weak
//!   connections into a ready-to-plan [`connection::ConnectionState`].
//! - [`error`] collects the typed error hierarchy for every fallible boundary above.

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod connection;
pub mod error;
pub mod generator;
pub mod network;
pub mod pod;
pub mod scenario;
pub mod solution;
pub mod solver;

#[cfg(test)]
mod test;
