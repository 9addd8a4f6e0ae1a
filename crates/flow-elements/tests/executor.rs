//! Traversal properties with built-in elements

use std::collections::HashMap;
use std::sync::Arc;

use flow_elements::BuiltinElements;
use flow_engine::{ElementKind, FlowBuilder, FlowConfig, FlowDefinition, FlowExecutor, RecordingSink};
use serde_json::json;

/// start fans out to two constants that both feed one merger
fn diamond() -> FlowDefinition {
    FlowBuilder::new("diamond")
        .element("start", ElementKind::Start)
        .element("left", ElementKind::Constants)
        .with_params(json!({"data_type": "json", "data": {"l": 1}}))
        .element("right", ElementKind::Constants)
        .with_params(json!({"data_type": "json", "data": {"r": 2}}))
        .element("join", ElementKind::Merger)
        .connect("start", "left")
        .connect("start", "right")
        .connect("left", "join")
        .with_ports("data", "data1")
        .connect("right", "join")
        .with_ports("data", "data2")
        .build()
}

#[tokio::test]
async fn test_dependencies_run_first_and_once() {
    let sink = Arc::new(RecordingSink::new());
    let mut executor =
        FlowExecutor::from_definition(&diamond(), &BuiltinElements::new(), FlowConfig::default())
            .unwrap()
            .with_sink(sink.clone());
    let result = executor.execute_flow(HashMap::new()).await.unwrap();

    assert_eq!(result.execution_order, vec!["start", "left", "right", "join"]);
    // a pulled dependency does not push its outputs forward
    assert_eq!(executor.cached_output("join").unwrap()["merged_data"], json!({"l": 1}));

    let started: Vec<_> = sink
        .events_of("element_started")
        .into_iter()
        .filter_map(|e| e.element_id().map(str::to_string))
        .collect();
    for id in ["start", "left", "right", "join"] {
        assert_eq!(started.iter().filter(|s| *s == id).count(), 1, "{id}");
    }

    let pulled = sink
        .events_of("element_started")
        .into_iter()
        .find(|e| e.element_id() == Some("right"))
        .unwrap();
    assert_eq!(pulled.data["backtracking"], true);
}

#[tokio::test]
async fn test_separate_executors_get_separate_runs() {
    let factory = BuiltinElements::new();
    let mut first =
        FlowExecutor::from_definition(&diamond(), &factory, FlowConfig::default()).unwrap();
    let mut second =
        FlowExecutor::from_definition(&diamond(), &factory, FlowConfig::default()).unwrap();
    let a = first.execute_flow(HashMap::new()).await.unwrap();
    let b = second.execute_flow(HashMap::new()).await.unwrap();
    assert_eq!(a.execution_order, b.execution_order);
    assert_ne!(first.run_id(), second.run_id());
}
