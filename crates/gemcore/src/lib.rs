//! Core abstractions for executable node graphs
//!
//! This crate provides the data model shared by every other crate, the node
//! capability traits, the error taxonomy, run events and the binary codec
//! for `.gem` files. It has no execution logic.

pub mod codec;
mod descriptor;
mod error;
pub mod events;
mod graph;
mod node;
mod value;

pub use descriptor::{ConstantField, ConstantKind, DescriptorLookup, NodeDescriptor, NodeRole};
pub use error::{
    ConstantError, EncodeError, FlowError, FormatError, GraphError, NodeError, TagError,
};
pub use events::*;
pub use graph::{ExecutableGraph, NodeRecord, NodeTag, SlotId};
pub use node::{Node, NodeContext, NodeOutput, NodeState};
pub use value::Value;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, FlowError>;
