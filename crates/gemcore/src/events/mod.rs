mod base;
mod warning;

pub use base::{EventBus, EventEmitter, ExecutionEvent, ExecutionId, NodeEvent};
pub use warning::ExecutionWarning;
