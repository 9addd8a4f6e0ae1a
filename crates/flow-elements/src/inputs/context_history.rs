//! Context History element
//!
//! Provides earlier conversation turns as a list.
//!
//! # Inputs
//! - `context_history` (optional) - List of turns, or JSON text of one
//!
//! # Outputs
//! - `context_history` - List of turns

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextHistoryParams {
    history: Option<Value>,
}

pub struct ContextHistoryElement {
    core: ElementCore,
    history: Option<Value>,
}

impl ContextHistoryElement {
    pub const PORT_CONTEXT_HISTORY: &'static str = "context_history";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: ContextHistoryParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::ContextHistory, def),
            history: params.history,
        })
    }
}

/// Coerce a history value into a list of turns.
fn as_history(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => items,
            _ => vec![Value::String(s)],
        },
        other => vec![Value::String(other.to_string())],
    }
}

#[async_trait]
impl Element for ContextHistoryElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!(
            "Executing context history element: {} ({})",
            self.core.name,
            self.core.id
        );

        let raw = self
            .core
            .input(Self::PORT_CONTEXT_HISTORY)
            .cloned()
            .or_else(|| self.history.clone())
            .unwrap_or(Value::Null);
        if !raw.is_array() && !raw.is_null() {
            log::warn!(
                "Context history in element {} is not a list, converting",
                self.core.id
            );
        }
        let history = Value::Array(as_history(raw));

        ctx.emit(
            "context_history",
            json!({"elementId": self.core.id, "context_history": history}),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_CONTEXT_HISTORY.into(), history);
        Ok(self.core.set_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, Harness};

    #[test]
    fn test_as_history() {
        assert_eq!(as_history(json!(["a", "b"])), vec![json!("a"), json!("b")]);
        assert_eq!(as_history(json!("[\"x\"]")), vec![json!("x")]);
        assert_eq!(as_history(json!("plain")), vec![json!("plain")]);
        assert_eq!(as_history(json!(7)), vec![json!("7")]);
        assert!(as_history(Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_parameter_used_when_input_missing() {
        let mut element = ContextHistoryElement::new(&definition(
            "ctx",
            ElementKind::ContextHistory,
            json!({"history": "[\"earlier\"]"}),
        ))
        .unwrap();
        let outputs = Harness::new().run(&mut element).await.unwrap();
        assert_eq!(outputs["context_history"], json!(["earlier"]));
    }
}
