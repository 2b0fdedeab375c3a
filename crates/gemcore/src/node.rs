use crate::{events::EventEmitter, NodeError, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute the node with its current input and constant values.
    ///
    /// Return [`NodeError::Runtime`] for expected, node-specific failures; those
    /// reach the caller of the run unchanged. Every other error is reported as
    /// an unexpected failure of this node.
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    /// Position of the node in the executable graph
    pub node_index: usize,

    /// Values received on input fields so far
    pub inputs: HashMap<String, Value>,

    /// Deserialized constant values
    pub constants: HashMap<String, Value>,

    /// Persistent state (survives repeated executions within one run)
    pub state: Arc<RwLock<NodeState>>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_index: usize, events: EventEmitter) -> Self {
        Self {
            node_index,
            inputs: HashMap::new(),
            constants: HashMap::new(),
            state: Arc::new(RwLock::new(NodeState::default())),
            events,
            cancellation: CancellationToken::new(),
        }
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get constant value or return error
    pub fn require_constant(&self, name: &str) -> Result<&Value, NodeError> {
        self.constants
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing constant: {}", name)))
    }

    pub fn constant_or(&self, name: &str, default: Value) -> Value {
        self.constants.get(name).cloned().unwrap_or(default)
    }
}

/// Persistent state for a node instance
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub data: HashMap<String, Value>,
}

/// Output from node execution, keyed by output field name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    pub outputs: HashMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(field.into(), value.into());
        self
    }
}
