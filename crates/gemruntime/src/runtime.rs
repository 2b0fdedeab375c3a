use crate::{registry::NodeRegistry, ExecutionEngine, RunReport};
use gemcore::codec::{self, Encoder};
use gemcore::{EventBus, ExecutableGraph, FlowError};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main runtime for loading and executing graphs
pub struct GemRuntime {
    registry: Arc<NodeRegistry>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl GemRuntime {
    /// Create a new runtime with an empty registry and default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ExecutableGraph, FlowError> {
        Ok(codec::decode(bytes, self.registry.as_ref())?)
    }

    pub fn encode(&self, graph: &ExecutableGraph) -> Result<Vec<u8>, FlowError> {
        let encoder = match self.config.uid_size {
            Some(size) => Encoder::new().with_uid_size(size),
            None => Encoder::new(),
        };
        Ok(encoder.encode(graph, self.registry.as_ref())?)
    }

    /// Read and decode a `.gem` file
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<ExecutableGraph, FlowError> {
        let path = path.as_ref();
        tracing::info!("Loading executable graph from {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        self.decode(&bytes)
    }

    /// Encode and write a `.gem` file
    pub async fn save(
        &self,
        path: impl AsRef<Path>,
        graph: &ExecutableGraph,
    ) -> Result<(), FlowError> {
        let path = path.as_ref();
        let bytes = self.encode(graph)?;
        tokio::fs::write(path, &bytes).await?;
        tracing::info!("Wrote {} nodes ({} bytes) to {}", graph.len(), bytes.len(), path.display());
        Ok(())
    }

    /// Resolve a graph against the registry without running it
    pub fn prepare(&self, graph: &ExecutableGraph) -> Result<ExecutionEngine, FlowError> {
        let engine = ExecutionEngine::new(graph, &self.registry)?;
        Ok(engine.with_max_steps(self.config.max_steps))
    }

    /// Execute a graph
    pub async fn execute(&self, graph: &ExecutableGraph) -> Result<RunReport, FlowError> {
        self.execute_with_cancellation(graph, &CancellationToken::new())
            .await
    }

    /// Execute a graph, stopping between node executions once `cancellation` fires
    pub async fn execute_with_cancellation(
        &self,
        graph: &ExecutableGraph,
        cancellation: &CancellationToken,
    ) -> Result<RunReport, FlowError> {
        let engine = self.prepare(graph)?;
        engine.run(&self.event_bus, cancellation).await
    }

    /// Load a `.gem` file and execute it
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<RunReport, FlowError> {
        let graph = self.load(path).await?;
        self.execute(&graph).await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<gemcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for GemRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Queue pops allowed per run; `None` runs until the queue empties
    pub max_steps: Option<usize>,
    /// Slot id width used when encoding; `None` picks the narrowest that fits
    pub uid_size: Option<u8>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            max_steps: None,
            uid_size: None,
        }
    }
}
