//! Event delivery through a queue-buffered sink

use std::collections::HashMap;
use std::sync::Arc;

use flow_elements::BuiltinElements;
use flow_engine::streaming::channel;
use flow_engine::{
    ElementKind, FieldSpec, FieldType, FlowBuilder, FlowConfig, FlowDefinition, FlowEvent,
    FlowExecutor,
};
use futures_util::StreamExt;
use serde_json::json;

fn quote_flow() -> FlowDefinition {
    FlowBuilder::new("quote")
        .element("quotes", ElementKind::Datablock)
        .with_params(json!({"data_type": "json", "data": {"symbol": "APT", "price": 8.25}}))
        .element("price", ElementKind::Selector)
        .with_params(json!({"key": "price"}))
        .with_input("data", FieldSpec::required(FieldType::Any))
        .element("end", ElementKind::End)
        .connect("quotes", "price")
        .connect("price", "end")
        .with_ports("value", "text_input")
        .build()
}

#[tokio::test]
async fn test_feed_order_matches_execution_order() {
    let (sink, feed) = channel(256);
    let mut executor =
        FlowExecutor::from_definition(&quote_flow(), &BuiltinElements::new(), FlowConfig::default())
            .unwrap()
            .with_sink(Arc::new(sink));
    let result = executor.execute_flow(HashMap::new()).await.unwrap();
    assert_eq!(result.execution_order, vec!["quotes", "price", "end"]);
    assert_eq!(result.final_output["text_output"], json!(8.25));
    drop(executor);

    let events: Vec<FlowEvent> = feed
        .into_stream()
        .map(|message| serde_json::from_str(&message).unwrap())
        .collect()
        .await;

    let started: Vec<&str> = events
        .iter()
        .filter(|e| e.event_type == "element_started")
        .filter_map(FlowEvent::element_id)
        .collect();
    assert_eq!(started, result.execution_order);

    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first(), Some(&"flow_started"));
    assert_eq!(types.last(), Some(&"flow_completed"));

    let position = |t: &str| types.iter().position(|x| *x == t).unwrap();
    assert!(position("datablock") < position("selector"));
    assert!(position("selector") < position("final_output"));
}
