//! Read Blockchain Data element
//!
//! Calls a Move view function and outputs its result.
//!
//! # Parameters
//! - `node_url`: defaults to the configured `aptos_node_url`
//! - `contract_address`, `function_name` (`func` or `module::func`)
//! - `function_args`: names of the inputs passed as arguments, in order
//!
//! # Outputs
//! - `data` - Decoded view result

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde_json::json;

use super::call::{chain_error, ensure_enabled, provider, ChainCall};
use crate::common::{core_accessors, parse_params};

pub struct ReadBlockchainDataElement {
    core: ElementCore,
    call: ChainCall,
}

impl ReadBlockchainDataElement {
    pub const PORT_DATA: &'static str = "data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::ReadBlockchainData, def),
            call: parse_params(def)?,
        })
    }
}

#[async_trait]
impl Element for ReadBlockchainDataElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!(
            "Executing read blockchain data element: {} ({})",
            self.core.name,
            self.core.id
        );
        ensure_enabled(ctx, &self.core.id).await?;
        self.core.check_inputs()?;

        let node_url = self.call.node_url(ctx).to_string();
        let function = self.call.full_function();
        let arguments = self.call.arguments(&self.core);
        ctx.emit(
            "blockchain_request",
            json!({
                "elementId": self.core.id,
                "node_url": node_url,
                "contract_address": self.call.contract_address,
                "function_name": self.call.function_name,
                "function_args": self.call.function_args,
            }),
        )
        .await;

        let result = match provider(ctx) {
            Ok(chain) => {
                chain
                    .view(&node_url, &function, &self.call.type_arguments, &arguments)
                    .await
            }
            Err(e) => Err(e),
        };
        let data = match result {
            Ok(data) => data,
            Err(e) => return Err(chain_error(ctx, &self.core.id, e).await),
        };

        ctx.emit(
            "blockchain_response",
            json!({"elementId": self.core.id, "response": data}),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_DATA.into(), data);
        Ok(self.core.set_outputs(outputs))
    }
}
