// crates/gemruntime/tests/engine_test.rs

use async_trait::async_trait;
use gemcore::{
    ConstantKind, ExecutableGraph, ExecutionEvent, ExecutionWarning, FlowError, GraphError, Node,
    NodeContext, NodeDescriptor, NodeError, NodeOutput, NodeRecord, NodeRole, NodeTag, Value,
};
use gemruntime::{ExecutionEngine, GemRuntime, NodeFactory, NodeRegistry, RuntimeConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EMIT: NodeTag = NodeTag::from_static("Emit7");
const DOUBLE: NodeTag = NodeTag::from_static("Doubl");
const RECORD: NodeTag = NodeTag::from_static("Recrd");
const RELAY: NodeTag = NodeTag::from_static("Relay");
const JOIN: NodeTag = NodeTag::from_static("Join2");
const FAIL_RUNTIME: NodeTag = NodeTag::from_static("FailR");
const FAIL_OTHER: NodeTag = NodeTag::from_static("FailO");
const PANIC: NodeTag = NodeTag::from_static("Panic");
const SILENT: NodeTag = NodeTag::from_static("Silnt");
const COUNT: NodeTag = NodeTag::from_static("Count");
const FLAG: NodeTag = NodeTag::from_static("Flag1");

#[derive(Clone, Copy)]
enum Behavior {
    Emit,
    Double,
    Record,
    Relay,
    Join,
    FailRuntime,
    FailOther,
    Panic,
    Silent,
    Count,
}

struct TestNode(Behavior);

#[async_trait]
impl Node for TestNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        match self.0 {
            Behavior::Emit => Ok(NodeOutput::new().with_output("out", 7.0)),
            Behavior::Double => {
                let x = ctx.require_input("x")?.as_f64().unwrap_or_default();
                Ok(NodeOutput::new().with_output("out", x * 2.0))
            }
            Behavior::Record => {
                let seen = ctx.require_input("in")?.clone();
                Ok(NodeOutput::new().with_output("seen", seen))
            }
            Behavior::Relay => {
                let v = ctx.require_input("in")?.clone();
                Ok(NodeOutput::new().with_output("out", v))
            }
            Behavior::Join => Ok(NodeOutput::new().with_output("out", 1.0)),
            Behavior::FailRuntime => Err(NodeError::runtime("learning rate is not a number")),
            Behavior::FailOther => Err(NodeError::ExecutionFailed("disk on fire".into())),
            Behavior::Panic => panic!("node exploded"),
            Behavior::Silent => Ok(NodeOutput::new()),
            Behavior::Count => {
                let mut state = ctx.state.write().await;
                let n = state.data.get("n").and_then(Value::as_f64).unwrap_or(0.0) + 1.0;
                state.data.insert("n".into(), Value::Number(n));
                Ok(NodeOutput::new().with_output("out", n))
            }
        }
    }
}

struct TestFactory {
    descriptor: NodeDescriptor,
    behavior: Behavior,
}

impl NodeFactory for TestFactory {
    fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    fn create(&self) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TestNode(self.behavior)))
    }
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    let mut add = |descriptor: NodeDescriptor, behavior| {
        registry.register(Arc::new(TestFactory { descriptor, behavior }));
    };
    add(NodeDescriptor::new(EMIT, "Emit", NodeRole::Source).with_output("out"), Behavior::Emit);
    add(
        NodeDescriptor::new(DOUBLE, "Double", NodeRole::Transform)
            .with_input("x")
            .with_output("out"),
        Behavior::Double,
    );
    add(
        NodeDescriptor::new(RECORD, "Record", NodeRole::Sink)
            .with_input("in")
            .with_output("seen"),
        Behavior::Record,
    );
    add(
        NodeDescriptor::new(RELAY, "Relay", NodeRole::Transform)
            .with_input("in")
            .with_output("out"),
        Behavior::Relay,
    );
    add(
        NodeDescriptor::new(JOIN, "Join", NodeRole::Transform)
            .with_input("a")
            .with_input("b")
            .with_output("out"),
        Behavior::Join,
    );
    add(
        NodeDescriptor::new(FAIL_RUNTIME, "Fail runtime", NodeRole::Transform)
            .with_input("in"),
        Behavior::FailRuntime,
    );
    add(
        NodeDescriptor::new(FAIL_OTHER, "Fail other", NodeRole::Transform).with_input("in"),
        Behavior::FailOther,
    );
    add(
        NodeDescriptor::new(PANIC, "Panic", NodeRole::Transform).with_input("in"),
        Behavior::Panic,
    );
    add(
        NodeDescriptor::new(SILENT, "Silent", NodeRole::Transform)
            .with_input("in")
            .with_output("out"),
        Behavior::Silent,
    );
    add(
        NodeDescriptor::new(COUNT, "Count", NodeRole::Transform)
            .with_input("in")
            .with_output("out"),
        Behavior::Count,
    );
    add(
        NodeDescriptor::new(FLAG, "Flag", NodeRole::Source)
            .with_output("out")
            .with_constant("on", ConstantKind::Flag { default: false }),
        Behavior::Emit,
    );
    registry
}

fn runtime(config: RuntimeConfig) -> GemRuntime {
    GemRuntime::with_registry(Arc::new(registry()), config)
}

fn source_into(slot: u64) -> NodeRecord {
    NodeRecord::new(EMIT).with_output([slot])
}

#[tokio::test]
async fn test_linear_chain_propagates_values() {
    // A(7) -> B(x2) -> C(record)
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(DOUBLE).with_input(1).with_output([2]),
        NodeRecord::new(RECORD).with_input(2).with_output([]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();

    assert_eq!(report.sink_outputs[&2]["seen"], Value::Number(14.0));
    assert_eq!(report.executions, 3);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_node_listed_before_its_producer_is_retried() {
    // The sink sits at index 0, so it is only reached through the queue.
    let graph: ExecutableGraph = vec![
        NodeRecord::new(RECORD).with_input(2).with_output([]),
        NodeRecord::new(DOUBLE).with_input(1).with_output([2]),
        source_into(1),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();
    assert_eq!(report.sink_outputs[&0]["seen"], Value::Number(14.0));
}

#[tokio::test]
async fn test_fan_in_waits_for_every_input() {
    // Emit feeds Join.a directly and Join.b through a relay; Join is dequeued
    // once before b arrives.
    let graph: ExecutableGraph = vec![
        NodeRecord::new(EMIT).with_output([1, 2]),
        NodeRecord::new(JOIN).with_input(1).with_input(3).with_output([4]),
        NodeRecord::new(RELAY).with_input(2).with_output([3]),
        NodeRecord::new(RECORD).with_input(4).with_output([]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();

    assert_eq!(report.sink_outputs[&3]["seen"], Value::Number(1.0));
    assert!(report.warnings.contains(&ExecutionWarning::IncompleteInput {
        node: 1,
        tag: JOIN,
        missing: vec!["b".into()],
    }));
}

#[tokio::test]
async fn test_starved_cycle_warns_and_terminates() {
    // S feeds A.in; A and B feed each other but A also needs B's value first.
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(JOIN).with_input(1).with_input(2).with_output([3]),
        NodeRecord::new(RELAY).with_input(3).with_output([2]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();

    assert_eq!(report.executions, 1);
    let incomplete = report
        .warnings
        .iter()
        .filter(|w| matches!(w, ExecutionWarning::IncompleteInput { .. }))
        .count();
    assert!(incomplete >= 1);
}

#[tokio::test]
async fn test_cycle_without_anchors_does_nothing() {
    let graph: ExecutableGraph = vec![
        NodeRecord::new(RELAY).with_input(1).with_output([2]),
        NodeRecord::new(RELAY).with_input(2).with_output([1]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();
    assert_eq!(report.executions, 0);
    assert_eq!(report.steps, 0);
}

#[tokio::test]
async fn test_self_loop_does_not_spin() {
    // Count feeds its own input; the copy of itself it enqueues is dropped
    // once it has run.
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(COUNT).with_input(1).with_output([1]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();
    assert_eq!(report.executions, 2);
}

#[tokio::test]
async fn test_ready_loop_is_bounded_by_step_limit() {
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(COUNT).with_input(1).with_output([2]),
        NodeRecord::new(RELAY).with_input(2).with_output([1]),
    ]
    .into();
    let config = RuntimeConfig {
        max_steps: Some(25),
        ..RuntimeConfig::default()
    };

    let err = runtime(config).execute(&graph).await.unwrap_err();
    assert!(matches!(err, FlowError::StepLimitExceeded { limit: 25 }));
}

#[tokio::test]
async fn test_runtime_error_is_returned_unchanged() {
    let graph: ExecutableGraph =
        vec![source_into(1), NodeRecord::new(FAIL_RUNTIME).with_input(1)].into();

    let err = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap_err();
    match err {
        FlowError::ExecutionRuntime(e) => {
            assert_eq!(e, NodeError::Runtime("learning rate is not a number".into()))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_other_errors_are_wrapped_as_debug() {
    let graph: ExecutableGraph =
        vec![source_into(1), NodeRecord::new(FAIL_OTHER).with_input(1)].into();

    let err = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap_err();
    match err {
        FlowError::ExecutionDebug { node, tag, source } => {
            assert_eq!(node, 1);
            assert_eq!(tag, FAIL_OTHER);
            assert_eq!(source, NodeError::ExecutionFailed("disk on fire".into()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_panic_is_wrapped_as_debug() {
    let graph: ExecutableGraph = vec![source_into(1), NodeRecord::new(PANIC).with_input(1)].into();

    let err = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::ExecutionDebug { source: NodeError::Panicked(ref msg), .. } if msg == "node exploded"
    ));
}

#[tokio::test]
async fn test_missing_output_is_filled_with_null() {
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(SILENT).with_input(1).with_output([2]),
        NodeRecord::new(RECORD).with_input(2).with_output([]),
    ]
    .into();

    let report = runtime(RuntimeConfig::default()).execute(&graph).await.unwrap();

    assert_eq!(report.sink_outputs[&2]["seen"], Value::Null);
    assert_eq!(
        report.warnings,
        vec![ExecutionWarning::MissingOutput {
            node: 1,
            tag: SILENT,
            field: "out".into(),
        }]
    );
}

#[tokio::test]
async fn test_warnings_are_broadcast() {
    let runtime = runtime(RuntimeConfig::default());
    let mut events = runtime.subscribe_events();
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(SILENT).with_input(1).with_output([]),
    ]
    .into();

    runtime.execute(&graph).await.unwrap();

    let mut warnings = 0;
    while let Ok(event) = events.try_recv() {
        if let ExecutionEvent::Warning { warning, .. } = event {
            assert_eq!(warning.node(), 1);
            warnings += 1;
        }
    }
    assert_eq!(warnings, 1);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_first_node() {
    let graph: ExecutableGraph = vec![
        source_into(1),
        NodeRecord::new(RECORD).with_input(1).with_output([]),
    ]
    .into();
    let token = CancellationToken::new();
    token.cancel();

    let err = runtime(RuntimeConfig::default())
        .execute_with_cancellation(&graph, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
}

#[test]
fn test_unknown_tag_fails_construction() {
    let graph: ExecutableGraph = vec![NodeRecord::new(NodeTag::from_static("Nope!"))].into();

    let err = ExecutionEngine::new(&graph, &registry()).err().unwrap();
    assert!(matches!(err, GraphError::UnknownNodeTag { node: 0, .. }));
}

#[test]
fn test_undecodable_constant_fails_construction() {
    let graph: ExecutableGraph =
        vec![NodeRecord::new(FLAG).with_output([]).with_constant("on", vec![9])].into();

    let err = ExecutionEngine::new(&graph, &registry()).err().unwrap();
    assert!(matches!(err, GraphError::ConstantDecode { node: 0, ref field, .. } if field == "on"));
}

#[test]
fn test_output_to_unknown_slot_fails_construction() {
    let graph: ExecutableGraph = vec![source_into(42)].into();

    let err = ExecutionEngine::new(&graph, &registry()).err().unwrap();
    assert!(matches!(err, GraphError::DanglingSlot { node: 0, slot: 42, .. }));
}

#[test]
fn test_dependencies_follow_shared_slots() {
    let graph: ExecutableGraph = vec![
        NodeRecord::new(EMIT).with_output([1, 2]),
        NodeRecord::new(RELAY).with_input(2).with_output([3]),
        NodeRecord::new(JOIN).with_input(1).with_input(3).with_output([]),
    ]
    .into();

    let engine = ExecutionEngine::new(&graph, &registry()).unwrap();

    assert_eq!(engine.anchors(), &[0]);
    assert_eq!(engine.successors(0), vec![1, 2]);
    // a node's own inputs are among its referenced slots
    assert_eq!(engine.successors(1), vec![1, 2]);
    assert_eq!(engine.successors(2), vec![2]);
}
