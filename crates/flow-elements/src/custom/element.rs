//! Custom code element
//!
//! Runs user JavaScript in the sandbox worker.
//!
//! # Parameters
//! - `code`: script body; it fills the global `output` object
//! - `hyperparameters`, `constants`: objects visible to the script
//!
//! Fails closed with a configuration error unless `allow_custom_code` is
//! set; no worker is started in that case.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    extension_keys, Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext,
    FlowError, Result, ValueMap,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::interpreter::SandboxJob;
use super::sandbox::{SandboxLimits, SandboxRunner};
use crate::common::{core_accessors, parse_params, preview};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomParams {
    code: String,
    hyperparameters: ValueMap,
    constants: ValueMap,
}

pub struct CustomElement {
    core: ElementCore,
    params: CustomParams,
}

impl CustomElement {
    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Custom, def),
            params: parse_params(def)?,
        })
    }

    /// The runner injected for this run, or one for the configured worker
    fn runner(ctx: &ExecutionContext<'_>) -> Result<Arc<SandboxRunner>> {
        match ctx
            .extensions()
            .get::<Arc<SandboxRunner>>(extension_keys::SANDBOX_RUNNER)
        {
            Some(runner) => Ok(runner.clone()),
            None => SandboxRunner::from_config(ctx.config()).map(Arc::new),
        }
    }

    async fn fail(&self, ctx: &ExecutionContext<'_>, error: FlowError) -> FlowError {
        log::error!("Custom element {} failed: {}", self.core.id, error);
        ctx.emit(
            "custom_code_error",
            json!({
                "elementId": self.core.id,
                "error": error.to_string(),
                "errorKind": error.kind(),
                "code_preview": preview(&Value::String(self.params.code.clone())),
            }),
        )
        .await;
        error
    }
}

#[async_trait]
impl Element for CustomElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing custom element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        if !ctx.config().allow_custom_code {
            let error = FlowError::config("Custom code execution is disabled in configuration");
            return Err(self.fail(ctx, error).await);
        }

        ctx.emit(
            "custom_code_start",
            json!({
                "elementId": self.core.id,
                "code_preview": preview(&Value::String(self.params.code.clone())),
            }),
        )
        .await;

        let job = SandboxJob {
            code: self.params.code.clone(),
            inputs: self.core.inputs.clone(),
            hyperparameters: self.params.hyperparameters.clone(),
            constants: self.params.constants.clone(),
        };
        let limits = SandboxLimits::from_config(ctx.config());
        let result = match Self::runner(ctx) {
            Ok(runner) => runner.run(&job, &limits).await,
            Err(e) => Err(e),
        };
        let output = match result {
            Ok(output) => output,
            Err(e) => return Err(self.fail(ctx, e).await),
        };

        let outputs = self.core.set_outputs(output);
        if let Err(e) = self.core.check_outputs() {
            return Err(self.fail(ctx, e).await);
        }

        ctx.emit(
            "custom_code_complete",
            json!({
                "elementId": self.core.id,
                "output_preview": preview(&Value::Object(outputs.clone())),
            }),
        )
        .await;
        Ok(outputs)
    }
}
