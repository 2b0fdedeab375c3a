// crates/gemnodes/tests/nodes_test.rs

use gemcore::{
    ExecutableGraph, ExecutionEvent, FlowError, NodeError, NodeEvent, NodeRecord, Value,
};
use gemnodes::{DebugNode, DelayNode, InputDataNode, OutputDataNode, ScaleNode};
use gemruntime::{GemRuntime, NodeRegistry, RuntimeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn runtime() -> GemRuntime {
    let mut registry = NodeRegistry::new();
    gemnodes::register_all(&mut registry);
    GemRuntime::with_registry(Arc::new(registry), RuntimeConfig::default())
}

fn scale_graph(value: &str, factor: &str) -> ExecutableGraph {
    vec![
        NodeRecord::new(InputDataNode::TAG)
            .with_output([1])
            .with_constant("value", value),
        NodeRecord::new(ScaleNode::TAG)
            .with_input(1)
            .with_output([2])
            .with_constant("factor", factor),
        NodeRecord::new(OutputDataNode::TAG)
            .with_input(2)
            .with_output([]),
    ]
    .into()
}

#[test]
fn test_register_all() {
    let mut registry = NodeRegistry::new();
    gemnodes::register_all(&mut registry);

    let tags: Vec<String> = registry.list_tags().iter().map(|t| t.to_string()).collect();
    assert_eq!(tags, vec!["DbgLG", "Delay", "InpDT", "OutDT", "Scale"]);
    assert!(registry.descriptor(&InputDataNode::TAG).unwrap().is_source());
    assert!(registry.descriptor(&OutputDataNode::TAG).unwrap().is_sink());
}

#[tokio::test]
async fn test_scale_pipeline_through_file_bytes() {
    let runtime = runtime();
    let bytes = runtime.encode(&scale_graph("21", "2")).unwrap();
    let graph = runtime.decode(&bytes).unwrap();

    let report = runtime.execute(&graph).await.unwrap();

    assert_eq!(report.sink_outputs[&2]["data"], Value::Number(42.0));
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_scale_with_bad_factor_is_a_runtime_error() {
    let err = runtime()
        .execute(&scale_graph("3", "lots"))
        .await
        .unwrap_err();

    match err {
        FlowError::ExecutionRuntime(e) => {
            assert!(e.is_runtime());
            assert!(e.to_string().contains("lots"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scale_with_text_input_is_unexpected() {
    let err = runtime()
        .execute(&scale_graph("hello", "2"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::ExecutionDebug {
            node: 1,
            source: NodeError::InvalidInputType { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_input_data_keeps_json_structure() {
    let graph: ExecutableGraph = vec![
        NodeRecord::new(InputDataNode::TAG)
            .with_output([1])
            .with_constant("value", r#"{"rows": [1, 2]}"#),
        NodeRecord::new(DebugNode::TAG)
            .with_input(1)
            .with_output([2])
            .with_constant("label", "rows"),
        NodeRecord::new(OutputDataNode::TAG)
            .with_input(2)
            .with_output([]),
    ]
    .into();

    let report = runtime().execute(&graph).await.unwrap();
    assert_eq!(
        report.sink_outputs[&2]["data"].to_json(),
        serde_json::json!({"rows": [1, 2]})
    );
}

#[tokio::test]
async fn test_debug_label_falls_back_when_empty() {
    let debug_with = |label: &str| {
        NodeRecord::new(DebugNode::TAG)
            .with_input(1)
            .with_output([])
            .with_constant("label", label)
    };
    let runtime = runtime();
    let mut events = runtime.subscribe_events();

    for label in ["rows", ""] {
        let graph: ExecutableGraph = vec![
            NodeRecord::new(InputDataNode::TAG)
                .with_output([1])
                .with_constant("value", "hi"),
            debug_with(label),
        ]
        .into();
        runtime.execute(&graph).await.unwrap();
    }

    let mut messages = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ExecutionEvent::NodeEvent {
            event: NodeEvent::Info { message },
            ..
        } = event
        {
            messages.push(message);
        }
    }
    assert_eq!(messages, vec!["DEBUG [rows]: hi", "DEBUG [debug]: hi"]);
}

#[tokio::test]
async fn test_delay_passes_value_through() {
    let graph: ExecutableGraph = vec![
        NodeRecord::new(InputDataNode::TAG)
            .with_output([1])
            .with_constant("value", "plain text"),
        NodeRecord::new(DelayNode::TAG)
            .with_input(1)
            .with_output([2])
            .with_constant("delay_ms", 5i64.to_be_bytes()),
        NodeRecord::new(OutputDataNode::TAG)
            .with_input(2)
            .with_output([]),
    ]
    .into();

    let report = runtime().execute(&graph).await.unwrap();
    assert_eq!(report.sink_outputs[&2]["data"], Value::from("plain text"));
}

#[tokio::test]
async fn test_delay_stops_on_cancellation() {
    let graph: ExecutableGraph = vec![
        NodeRecord::new(InputDataNode::TAG)
            .with_output([1])
            .with_constant("value", "1"),
        NodeRecord::new(DelayNode::TAG)
            .with_input(1)
            .with_output([2])
            .with_constant("delay_ms", 60_000i64.to_be_bytes()),
        NodeRecord::new(OutputDataNode::TAG)
            .with_input(2)
            .with_output([]),
    ]
    .into();

    let runtime = runtime();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = runtime
        .execute_with_cancellation(&graph, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
}
