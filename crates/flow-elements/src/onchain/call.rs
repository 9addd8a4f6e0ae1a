//! Parameters and plumbing shared by the on-chain elements

use std::sync::Arc;

use flow_engine::{ChainProvider, ElementCore, ExecutionContext, FlowError, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::aptos::AptosRestClient;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ChainCall {
    pub node_url: String,
    pub contract_address: String,
    /// `func` or `module::func`
    pub function_name: String,
    /// Input names whose values become the call arguments
    pub function_args: Vec<String>,
    pub type_arguments: Vec<String>,
}

impl ChainCall {
    /// `{contract}::{module}::{func}`; a bare name lives in module `script`.
    pub fn full_function(&self) -> String {
        let mut parts = self.function_name.split("::");
        let (module, func) = match (parts.next(), parts.next()) {
            (Some(module), Some(func)) => (module, func),
            _ => ("script", self.function_name.as_str()),
        };
        format!("{}::{}::{}", self.contract_address, module, func)
    }

    pub fn node_url<'a>(&'a self, ctx: &'a ExecutionContext<'_>) -> &'a str {
        if self.node_url.is_empty() {
            &ctx.config().aptos_node_url
        } else {
            &self.node_url
        }
    }

    /// Argument values in declared order; a missing input becomes null.
    pub fn arguments(&self, core: &ElementCore) -> Vec<Value> {
        self.function_args
            .iter()
            .map(|name| match core.input(name) {
                Some(value) => value.clone(),
                None => {
                    log::warn!(
                        "Argument '{}' not found in inputs for element {}",
                        name,
                        core.id
                    );
                    Value::Null
                }
            })
            .collect()
    }
}

/// Emit `blockchain_error` and build the error to return.
pub(crate) async fn chain_error(
    ctx: &ExecutionContext<'_>,
    element_id: &str,
    error: FlowError,
) -> FlowError {
    log::error!("{}", error);
    ctx.emit(
        "blockchain_error",
        json!({"elementId": element_id, "error": error.to_string()}),
    )
    .await;
    error
}

/// Fail closed unless chain access is enabled.
pub(crate) async fn ensure_enabled(ctx: &ExecutionContext<'_>, element_id: &str) -> Result<()> {
    if ctx.config().enable_blockchain {
        return Ok(());
    }
    let error = FlowError::config("Blockchain functionality is disabled in configuration");
    Err(chain_error(ctx, element_id, error).await)
}

/// The injected chain provider, or a REST client for the node API
pub(crate) fn provider(ctx: &ExecutionContext<'_>) -> Result<Arc<dyn ChainProvider>> {
    match ctx.extensions().chain_provider() {
        Some(provider) => Ok(provider),
        None => Ok(Arc::new(AptosRestClient::new(ctx.config().http_timeout())?)),
    }
}
