//! Build Transaction JSON element
//!
//! Builds an unsigned entry-function transaction for the user to sign.
//!
//! # Parameters
//! Same as the read element: `node_url`, `contract_address`,
//! `function_name`, `function_args`.
//!
//! # Inputs
//! - `wallet_address` (optional) - Sender when `aptos_sender_address` is not
//!   configured
//!
//! # Outputs
//! - `transaction_json`

use async_trait::async_trait;
use flow_engine::events::{mask, redact_sensitive};
use flow_engine::{
    Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, FlowError, Result,
    ValueMap,
};
use serde_json::{json, Value};

use super::call::{chain_error, ensure_enabled, provider, ChainCall};
use crate::common::{core_accessors, parse_params};

pub struct BuildTransactionJsonElement {
    core: ElementCore,
    call: ChainCall,
}

impl BuildTransactionJsonElement {
    pub const PORT_WALLET_ADDRESS: &'static str = "wallet_address";
    pub const PORT_TRANSACTION_JSON: &'static str = "transaction_json";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::BuildTransactionJson, def),
            call: parse_params(def)?,
        })
    }

    fn sender(&self, ctx: &ExecutionContext<'_>) -> Option<String> {
        ctx.config()
            .aptos_sender_address
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.core
                    .input(Self::PORT_WALLET_ADDRESS)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
    }
}

/// Transaction with the sender and other sensitive fields masked
fn redact_transaction(transaction: &Value) -> Value {
    let mut safe = redact_sensitive(transaction);
    if let Some(sender) = safe.get_mut("sender") {
        *sender = mask(sender);
    }
    safe
}

#[async_trait]
impl Element for BuildTransactionJsonElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!(
            "Executing build transaction JSON element: {} ({})",
            self.core.name,
            self.core.id
        );
        ensure_enabled(ctx, &self.core.id).await?;
        self.core.check_inputs()?;

        let Some(sender) = self.sender(ctx) else {
            let error = FlowError::config("No sender address provided for transaction");
            return Err(chain_error(ctx, &self.core.id, error).await);
        };

        let node_url = self.call.node_url(ctx).to_string();
        let function = self.call.full_function();
        let arguments = self.call.arguments(&self.core);
        ctx.emit(
            "transaction_build_request",
            json!({
                "elementId": self.core.id,
                "node_url": node_url,
                "contract_address": self.call.contract_address,
                "function_name": self.call.function_name,
                "function_args": self.call.function_args,
                "sender": mask(&Value::String(sender.clone())),
            }),
        )
        .await;

        let result = match provider(ctx) {
            Ok(chain) => {
                chain
                    .build_transaction(
                        &node_url,
                        &sender,
                        &function,
                        &self.call.type_arguments,
                        &arguments,
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        let transaction = match result {
            Ok(tx) => tx,
            Err(e) => return Err(chain_error(ctx, &self.core.id, e).await),
        };

        ctx.emit(
            "transaction_build_response",
            json!({
                "elementId": self.core.id,
                "transaction_json": redact_transaction(&transaction),
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_TRANSACTION_JSON.into(), transaction);
        Ok(self.core.set_outputs(outputs))
    }
}
