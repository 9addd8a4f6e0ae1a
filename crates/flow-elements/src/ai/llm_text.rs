//! LLM text element
//!
//! Generates free text through the injected [`TextGenerator`].
//!
//! # Parameters
//! - `model`: defaults to the configured `default_model_id`
//! - `temperature` (0.65), `max_tokens` (1000)
//! - `wrapper_prompt`: template with `{prompt}`, `{context}` and
//!   `{additional_data}` placeholders
//!
//! # Inputs
//! - `prompt` - User request
//! - `context` (optional) - List of context lines
//! - `additional_data` (optional) - Object appended as extra information
//!
//! # Outputs
//! - `llm_output` - Generated text
//!
//! When a sink is attached the completion is streamed as `llm_chunk` events.
//!
//! [`TextGenerator`]: flow_engine::TextGenerator

use async_trait::async_trait;
use flow_engine::{
    Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, GenerationRequest,
    Result, ValueMap,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{context_lines, core_accessors, format_prompt, parse_params, text_input};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct LlmParams {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub wrapper_prompt: String,
    pub llm_hidden_prompt: String,
}

impl LlmParams {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            model: None,
            temperature,
            max_tokens: 1000,
            wrapper_prompt: String::new(),
            llm_hidden_prompt: String::new(),
        }
    }

    /// Request for a rendered prompt, resolving the model against the config
    pub fn request(&self, ctx: &ExecutionContext<'_>, prompt: String) -> GenerationRequest {
        GenerationRequest {
            model: self
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| ctx.config().default_model_id.clone()),
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Default for LlmParams {
    fn default() -> Self {
        Self::with_temperature(0.65)
    }
}

/// Prompt parts read from the standard LLM inputs
pub(crate) fn render_user_prompt(core: &ElementCore, wrapper: &str) -> String {
    let prompt = text_input(&core.inputs, "prompt");
    let context = context_lines(core.input("context"));
    let additional = core
        .input("additional_data")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    format_prompt(wrapper, &prompt, &context, &additional)
}

pub struct LlmTextElement {
    core: ElementCore,
    params: LlmParams,
}

impl LlmTextElement {
    pub const PORT_PROMPT: &'static str = "prompt";
    pub const PORT_LLM_OUTPUT: &'static str = "llm_output";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::LlmText, def),
            params: parse_params(def)?,
        })
    }

    async fn generate(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &GenerationRequest,
    ) -> Result<String> {
        let generator = ctx.extensions().text_generator()?;
        if !ctx.is_streaming() {
            return generator.generate(request).await;
        }

        let metadata = json!({
            "element_id": self.core.id,
            "element_type": self.core.kind.as_str(),
            "element_name": self.core.name,
            "flow_id": ctx.flow_id(),
        });
        let mut stream = generator.generate_stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            ctx.emit(
                "llm_chunk",
                json!({"elementId": self.core.id, "content": chunk, "metadata": metadata}),
            )
            .await;
            text.push_str(&chunk);
        }
        Ok(text)
    }
}

#[async_trait]
impl Element for LlmTextElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing LLM text element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let prompt = render_user_prompt(&self.core, &self.params.wrapper_prompt);
        let request = self.params.request(ctx, prompt);
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

        let text = match self.generate(ctx, &request).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("LLM text element {} failed: {}", self.core.id, e);
                ctx.emit(
                    "llm_error",
                    json!({"elementId": self.core.id, "error": e.to_string()}),
                )
                .await;
                return Err(e);
            }
        };

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_LLM_OUTPUT.into(), Value::String(text));
        let outputs = self.core.set_outputs(outputs);
        self.core.check_outputs()?;
        Ok(outputs)
    }
}
