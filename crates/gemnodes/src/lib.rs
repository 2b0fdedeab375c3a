//! Standard node library
//!
//! Built-in node kinds every `gem` runtime ships with

mod data;
mod debug;
mod math;
mod time;

pub use data::{InputDataNode, InputDataNodeFactory, OutputDataNode, OutputDataNodeFactory};
pub use debug::{DebugNode, DebugNodeFactory};
pub use math::{ScaleNode, ScaleNodeFactory};
pub use time::{DelayNode, DelayNodeFactory};

use gemruntime::NodeRegistry;
use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(InputDataNodeFactory::new()));
    registry.register(Arc::new(OutputDataNodeFactory::new()));
    registry.register(Arc::new(ScaleNodeFactory::new()));
    registry.register(Arc::new(DebugNodeFactory::new()));
    registry.register(Arc::new(DelayNodeFactory::new()));
}
