use crate::registry::NodeRegistry;
use chrono::Utc;
use futures::FutureExt;
use gemcore::{
    EventBus, ExecutableGraph, ExecutionEvent, ExecutionId, ExecutionWarning, FlowError,
    GraphError, Node, NodeContext, NodeDescriptor, NodeError, NodeRecord, NodeState, NodeTag,
    SlotId, Value,
};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A graph resolved against a registry and ready to run.
///
/// Construction looks up every descriptor, decodes constants and indexes the
/// slot wiring once; each call to [`run`](Self::run) starts from fresh
/// per-node state.
pub struct ExecutionEngine {
    nodes: Vec<PreparedNode>,
    /// Input slot id → (owning node, input field)
    consumers: HashMap<SlotId, (usize, String)>,
    /// Producer → consumer edges, one graph node per position
    dependencies: DiGraph<usize, ()>,
    anchors: Vec<usize>,
    max_steps: Option<usize>,
}

struct PreparedNode {
    record: NodeRecord,
    descriptor: NodeDescriptor,
    instance: Box<dyn Node>,
    constants: HashMap<String, Value>,
}

/// Values of one node during one run
#[derive(Debug, Default)]
pub struct RuntimeNodeState {
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub constants: HashMap<String, Value>,
    persistent: Arc<RwLock<NodeState>>,
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: ExecutionId,
    /// Latest outputs of every sink node that executed, by node index
    pub sink_outputs: BTreeMap<usize, HashMap<String, Value>>,
    pub warnings: Vec<ExecutionWarning>,
    /// Number of node executions
    pub executions: usize,
    /// Number of queue pops
    pub steps: usize,
}

impl ExecutionEngine {
    pub fn new(graph: &ExecutableGraph, registry: &NodeRegistry) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(graph.len());
        let mut consumers = HashMap::new();
        let mut anchors = Vec::new();

        for (index, record) in graph.iter() {
            let tag = record.tag;
            let descriptor = registry
                .descriptor(&tag)
                .ok_or(GraphError::UnknownNodeTag { node: index, tag })?
                .clone();
            check_arity(index, record, &descriptor)?;

            let mut constants = HashMap::new();
            for field in &descriptor.constants {
                let blob = record.constants.get(&field.name).ok_or_else(|| {
                    GraphError::SchemaMismatch {
                        node: index,
                        tag,
                        detail: format!("missing constant '{}'", field.name),
                    }
                })?;
                let value = field.deserialize(blob).map_err(|source| GraphError::ConstantDecode {
                    node: index,
                    tag,
                    field: field.name.clone(),
                    source,
                })?;
                constants.insert(field.name.clone(), value);
            }

            for (slot, name) in record.inputs.iter().zip(&descriptor.inputs) {
                consumers.insert(*slot, (index, name.clone()));
            }
            if descriptor.is_source() {
                anchors.push(index);
            }

            let instance = registry.create_node(index, tag)?;
            nodes.push(PreparedNode {
                record: record.clone(),
                descriptor,
                instance,
                constants,
            });
        }

        for (index, node) in nodes.iter().enumerate() {
            if let Some(slot) = node
                .record
                .outputs
                .iter()
                .flatten()
                .find(|slot| !consumers.contains_key(*slot))
            {
                return Err(GraphError::DanglingSlot {
                    node: index,
                    tag: node.record.tag,
                    slot: *slot,
                });
            }
        }

        let dependencies = build_dependencies(&nodes);
        tracing::debug!(
            nodes = nodes.len(),
            anchors = anchors.len(),
            edges = dependencies.edge_count(),
            "prepared execution graph"
        );

        Ok(Self {
            nodes,
            consumers,
            dependencies,
            anchors,
            max_steps: None,
        })
    }

    /// Fail the run with [`FlowError::StepLimitExceeded`] after `limit` queue pops.
    pub fn with_max_steps(mut self, limit: Option<usize>) -> Self {
        self.max_steps = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    /// Nodes that share a slot with `node` as consumers, in index order
    pub fn successors(&self, node: usize) -> Vec<usize> {
        let mut next: Vec<usize> = self
            .dependencies
            .neighbors_directed(NodeIndex::new(node), Direction::Outgoing)
            .map(|idx| self.dependencies[idx])
            .collect();
        next.sort_unstable();
        next
    }

    /// Run the graph to completion.
    ///
    /// Nodes are driven from a FIFO queue seeded with the anchors. A popped
    /// node enqueues all of its successors whether or not they are ready;
    /// there is no visited set, so a node fires again whenever a predecessor
    /// re-enqueues it with fresh inputs. After each pop every other queued
    /// occurrence of the node is dropped.
    pub async fn run(
        &self,
        events: &EventBus,
        cancellation: &CancellationToken,
    ) -> Result<RunReport, FlowError> {
        let execution_id = Uuid::new_v4();
        let start = Instant::now();

        events.emit(ExecutionEvent::RunStarted {
            execution_id,
            nodes: self.nodes.len(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting graph execution: {} ({} nodes)", execution_id, self.nodes.len());

        let mut report = RunReport {
            execution_id,
            sink_outputs: BTreeMap::new(),
            warnings: Vec::new(),
            executions: 0,
            steps: 0,
        };
        let result = self.propagate(events, cancellation, &mut report).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        events.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: result.is_ok(),
            executions: report.executions,
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    "Graph execution {} finished: {} executions, {} warnings, {}ms",
                    execution_id,
                    report.executions,
                    report.warnings.len(),
                    duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Graph execution {} failed: {}", execution_id, e);
                Err(e)
            }
        }
    }

    async fn propagate(
        &self,
        events: &EventBus,
        cancellation: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<(), FlowError> {
        let mut states: Vec<RuntimeNodeState> = self
            .nodes
            .iter()
            .map(|node| RuntimeNodeState {
                constants: node.constants.clone(),
                ..RuntimeNodeState::default()
            })
            .collect();
        let mut queue: VecDeque<usize> = self.anchors.iter().copied().collect();
        let execution_id = report.execution_id;

        // Bumped on every execution. A node skipped for missing input at the
        // current generation cannot have received anything since.
        let mut generation = 0usize;
        let mut skipped_at: Vec<Option<usize>> = vec![None; self.nodes.len()];

        while let Some(current) = queue.pop_front() {
            if cancellation.is_cancelled() {
                return Err(FlowError::Cancelled);
            }
            report.steps += 1;
            if let Some(limit) = self.max_steps {
                if report.steps > limit {
                    return Err(FlowError::StepLimitExceeded { limit });
                }
            }

            if skipped_at[current] == Some(generation) {
                tracing::trace!(node = current, "dropping stalled node");
                queue.retain(|n| *n != current);
                continue;
            }

            queue.extend(self.successors(current));

            let node = &self.nodes[current];
            if !node.descriptor.is_source() {
                let missing: Vec<String> = node
                    .descriptor
                    .inputs
                    .iter()
                    .filter(|name| !states[current].inputs.contains_key(*name))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    skipped_at[current] = Some(generation);
                    self.warn(
                        events,
                        execution_id,
                        report,
                        ExecutionWarning::IncompleteInput {
                            node: current,
                            tag: node.record.tag,
                            missing,
                        },
                    );
                    queue.retain(|n| *n != current);
                    continue;
                }
            }

            let outputs = self
                .execute_node(current, &states[current], events, report, cancellation)
                .await?;
            generation += 1;
            report.executions += 1;

            if node.descriptor.is_sink() {
                report.sink_outputs.insert(current, outputs.clone());
            } else {
                for (field, consumers) in node.descriptor.outputs.iter().zip(&node.record.outputs) {
                    let value = outputs.get(field).cloned().unwrap_or_default();
                    for slot in consumers {
                        if let Some((target, input)) = self.consumers.get(slot) {
                            states[*target].inputs.insert(input.clone(), value.clone());
                        }
                    }
                }
            }
            states[current].outputs = outputs;

            queue.retain(|n| *n != current);
        }

        Ok(())
    }

    async fn execute_node(
        &self,
        index: usize,
        state: &RuntimeNodeState,
        events: &EventBus,
        report: &mut RunReport,
        cancellation: &CancellationToken,
    ) -> Result<HashMap<String, Value>, FlowError> {
        let node = &self.nodes[index];
        let tag = node.record.tag;
        let execution_id = report.execution_id;

        let ctx = NodeContext {
            node_index: index,
            inputs: state.inputs.clone(),
            constants: state.constants.clone(),
            state: state.persistent.clone(),
            events: events.create_emitter(execution_id, index),
            cancellation: cancellation.child_token(),
        };

        events.emit(ExecutionEvent::NodeStarted {
            execution_id,
            node: index,
            tag,
            timestamp: Utc::now(),
        });
        tracing::debug!("Executing node {} ({})", index, tag);

        let start = Instant::now();
        let result = match AssertUnwindSafe(node.instance.execute(ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(NodeError::Panicked(panic_message(payload))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut outputs = match result {
            Ok(output) => output.outputs,
            Err(e) => {
                tracing::error!("Node {} ({}) failed: {}", index, tag, e);
                events.emit(ExecutionEvent::NodeFailed {
                    execution_id,
                    node: index,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(classify_failure(index, tag, e));
            }
        };

        for field in &node.descriptor.outputs {
            if !outputs.contains_key(field) {
                outputs.insert(field.clone(), Value::Null);
                self.warn(
                    events,
                    execution_id,
                    report,
                    ExecutionWarning::MissingOutput {
                        node: index,
                        tag,
                        field: field.clone(),
                    },
                );
            }
        }

        tracing::debug!("Node {} ({}) completed in {}ms", index, tag, duration_ms);
        events.emit(ExecutionEvent::NodeCompleted {
            execution_id,
            node: index,
            outputs: outputs.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });
        Ok(outputs)
    }

    fn warn(
        &self,
        events: &EventBus,
        execution_id: ExecutionId,
        report: &mut RunReport,
        warning: ExecutionWarning,
    ) {
        tracing::warn!("{}", warning);
        events.emit(ExecutionEvent::Warning {
            execution_id,
            warning: warning.clone(),
            timestamp: Utc::now(),
        });
        report.warnings.push(warning);
    }
}

/// Runtime errors reach the caller as they are; anything else is wrapped.
fn classify_failure(node: usize, tag: NodeTag, error: NodeError) -> FlowError {
    match error {
        NodeError::Runtime(_) => FlowError::ExecutionRuntime(error),
        // A node that stopped early on cancellation ends the run the same way a pop would
        NodeError::Cancelled => FlowError::Cancelled,
        source => FlowError::ExecutionDebug { node, tag, source },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn check_arity(
    index: usize,
    record: &NodeRecord,
    descriptor: &NodeDescriptor,
) -> Result<(), GraphError> {
    let detail = if record.inputs.len() != descriptor.inputs.len() {
        format!(
            "{} inputs, descriptor declares {}",
            record.inputs.len(),
            descriptor.inputs.len()
        )
    } else if record.outputs.len() != descriptor.outputs.len() {
        format!(
            "{} outputs, descriptor declares {}",
            record.outputs.len(),
            descriptor.outputs.len()
        )
    } else {
        return Ok(());
    };
    Err(GraphError::SchemaMismatch {
        node: index,
        tag: record.tag,
        detail,
    })
}

/// A precedes B when any of B's input slots is among A's referenced slots
/// (A's inputs and every consumer of A's outputs).
fn build_dependencies(nodes: &[PreparedNode]) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
    for index in 0..nodes.len() {
        graph.add_node(index);
    }

    for (producer, node) in nodes.iter().enumerate() {
        let referenced: HashSet<SlotId> = node.record.referenced_slots().collect();
        for (consumer, other) in nodes.iter().enumerate() {
            if other.record.inputs.iter().any(|slot| referenced.contains(slot)) {
                graph.add_edge(NodeIndex::new(producer), NodeIndex::new(consumer), ());
            }
        }
    }
    graph
}
