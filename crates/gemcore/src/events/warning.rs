use crate::NodeTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recoverable conditions reported during a run. The run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionWarning {
    /// The node was dequeued before all of its inputs were filled; this
    /// occurrence was skipped.
    IncompleteInput {
        node: usize,
        tag: NodeTag,
        missing: Vec<String>,
    },
    /// The node finished without producing a declared output; it was filled
    /// with `Value::Null`.
    MissingOutput {
        node: usize,
        tag: NodeTag,
        field: String,
    },
}

impl ExecutionWarning {
    pub fn node(&self) -> usize {
        match self {
            ExecutionWarning::IncompleteInput { node, .. }
            | ExecutionWarning::MissingOutput { node, .. } => *node,
        }
    }
}

impl fmt::Display for ExecutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionWarning::IncompleteInput { node, tag, missing } => write!(
                f,
                "node {} ({}) skipped: incomplete input, missing {}",
                node,
                tag,
                missing.join(", ")
            ),
            ExecutionWarning::MissingOutput { node, tag, field } => write!(
                f,
                "node {} ({}) did not produce output '{}'; replaced with null",
                node, tag, field
            ),
        }
    }
}
