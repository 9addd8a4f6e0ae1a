//! Chat Input element
//!
//! Provides the user's chat message to the flow. The message normally
//! arrives as an initial input; the `message` parameter is the fallback.
//!
//! # Inputs
//! - `chat_input` (optional) - The user's message
//!
//! # Outputs
//! - `chat_input` - The message (empty string if not provided)

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatInputParams {
    message: Option<String>,
}

pub struct ChatInputElement {
    core: ElementCore,
    message: Option<String>,
}

impl ChatInputElement {
    pub const PORT_CHAT_INPUT: &'static str = "chat_input";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: ChatInputParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::ChatInput, def),
            message: params.message,
        })
    }
}

#[async_trait]
impl Element for ChatInputElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing chat input element: {} ({})", self.core.name, self.core.id);

        let chat_input = match self.core.input(Self::PORT_CHAT_INPUT) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | Some(Value::String(_)) | None => match &self.message {
                Some(message) => message.clone(),
                None => {
                    log::warn!("No chat input provided to element {}", self.core.id);
                    String::new()
                }
            },
            Some(other) => other.to_string(),
        };

        ctx.emit(
            "chat_input",
            json!({"elementId": self.core.id, "chat_input": chat_input}),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_CHAT_INPUT.into(), Value::String(chat_input));
        Ok(self.core.set_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, Harness};

    #[tokio::test]
    async fn test_input_wins_over_parameter() {
        let mut element = ChatInputElement::new(&definition(
            "chat",
            ElementKind::ChatInput,
            json!({"message": "fallback"}),
        ))
        .unwrap();
        element.core_mut().set_input("chat_input", json!("hello"));

        let harness = Harness::new();
        let outputs = harness.run(&mut element).await.unwrap();
        assert_eq!(outputs["chat_input"], "hello");
        assert_eq!(harness.events_of("chat_input")[0].data["chat_input"], "hello");
    }

    #[tokio::test]
    async fn test_parameter_fallback_and_empty_default() {
        let mut with_param = ChatInputElement::new(&definition(
            "chat",
            ElementKind::ChatInput,
            json!({"message": "fallback"}),
        ))
        .unwrap();
        let outputs = Harness::new().run(&mut with_param).await.unwrap();
        assert_eq!(outputs["chat_input"], "fallback");

        let mut bare =
            ChatInputElement::new(&definition("chat", ElementKind::ChatInput, json!({}))).unwrap();
        let outputs = Harness::new().run(&mut bare).await.unwrap();
        assert_eq!(outputs["chat_input"], "");
    }
}
