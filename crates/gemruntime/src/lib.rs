//! Graph execution runtime
//!
//! This crate provides the node registry, the dataflow execution engine that
//! drives an executable graph, and the runtime façade that ties decoding,
//! events and configuration together.

mod executor;
mod registry;
mod runtime;

pub use executor::{ExecutionEngine, RunReport, RuntimeNodeState};
pub use registry::{NodeFactory, NodeRegistry};
pub use runtime::{GemRuntime, RuntimeConfig};
