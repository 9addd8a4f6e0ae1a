//! LLM structured element
//!
//! Asks the model for a JSON object shaped like the element's output schema
//! and exposes its fields as outputs.
//!
//! # Parameters
//! - `model`, `temperature` (0.3), `max_tokens` (1000), `wrapper_prompt`
//! - `llm_hidden_prompt`: instructions appended after the user prompt
//!
//! A reply that is not a JSON object is recovered: an `llm_warning` event is
//! emitted and every output field takes its type's zero value.

use async_trait::async_trait;
use flow_engine::{
    Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, Schema,
    ValueMap,
};
use serde_json::{json, Value};

use super::llm_text::{render_user_prompt, LlmParams};
use crate::common::{core_accessors, parse_params};

pub struct LlmStructuredElement {
    core: ElementCore,
    params: LlmParams,
}

impl LlmStructuredElement {
    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let mut params: LlmParams = parse_params(def)?;
        if !def.params.contains_key("temperature") {
            params.temperature = 0.3;
        }
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::LlmStructured, def),
            params,
        })
    }

    fn render_prompt(&self) -> String {
        let user_part = render_user_prompt(&self.core, &self.params.wrapper_prompt);
        let schema = serde_json::to_string_pretty(&self.core.output_schema)
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "{}\n\n{}\n\nYou must respond with a valid JSON object that follows this exact schema:\n{}\n\n\
             Your JSON response should contain only the requested fields.\n\
             Do not include explanations or markdown formatting in your response, only the JSON object.",
            user_part, self.params.llm_hidden_prompt, schema
        )
        .trim()
        .to_string()
    }
}

/// Parse a model reply as a JSON object, ignoring markdown code fences and
/// any chatter around the object.
pub fn parse_json_reply(reply: &str) -> std::result::Result<ValueMap, String> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

/// Zero value for every field of a schema
fn recovered_outputs(schema: &Schema) -> ValueMap {
    schema
        .iter()
        .map(|(name, spec)| (name.clone(), spec.field_type.default_value()))
        .collect()
}

#[async_trait]
impl Element for LlmStructuredElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!(
            "Executing LLM structured element: {} ({})",
            self.core.name,
            self.core.id
        );
        self.core.check_inputs()?;

        let request = self.params.request(ctx, self.render_prompt());
        ctx.emit(
            "llm_prompt",
            json!({
                "elementId": self.core.id,
                "prompt": request.prompt,
                "model": request.model,
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }),
        )
        .await;

        let reply = match ctx.extensions().text_generator() {
            Ok(generator) => generator.generate(&request).await,
            Err(e) => Err(e),
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Error in LLM structured generation: {}", e);
                ctx.emit(
                    "llm_error",
                    json!({"elementId": self.core.id, "error": e.to_string()}),
                )
                .await;
                return Err(e);
            }
        };

        let structured = match parse_json_reply(&reply) {
            Ok(map) => map,
            Err(e) => {
                log::error!("Error parsing structured output for {}: {}", self.core.id, e);
                ctx.emit(
                    "llm_warning",
                    json!({
                        "elementId": self.core.id,
                        "warning": format!("Failed to parse JSON response, attempting recovery: {}", e),
                        "raw_response": reply,
                    }),
                )
                .await;
                recovered_outputs(&self.core.output_schema)
            }
        };

        ctx.emit(
            "llm_structured_result",
            json!({"elementId": self.core.id, "structured_output": structured}),
        )
        .await;

        let outputs = self.core.set_outputs(structured);
        self.core.check_outputs()?;
        Ok(outputs)
    }
}
