//! End element
//!
//! Terminal element. Its outputs become the run's final output.
//!
//! # Inputs
//! - `text_input` (optional) - Text answer for the caller
//! - `proposed_transaction` (optional) - Transaction payload for the caller to sign
//!
//! # Outputs
//! - `text_output`
//! - `proposed_transaction`

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde_json::{json, Value};

use crate::common::core_accessors;

pub struct EndElement {
    core: ElementCore,
}

impl EndElement {
    pub const PORT_TEXT_INPUT: &'static str = "text_input";
    pub const PORT_PROPOSED_TRANSACTION: &'static str = "proposed_transaction";
    pub const PORT_TEXT_OUTPUT: &'static str = "text_output";

    pub fn new(def: &ElementDefinition) -> Self {
        Self {
            core: ElementCore::from_definition(ElementKind::End, def),
        }
    }
}

#[async_trait]
impl Element for EndElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing end element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let text_output = self
            .core
            .input(Self::PORT_TEXT_INPUT)
            .cloned()
            .unwrap_or(Value::Null);
        let proposed_transaction = self
            .core
            .input(Self::PORT_PROPOSED_TRANSACTION)
            .cloned()
            .unwrap_or(Value::Null);

        ctx.emit(
            "final_output",
            json!({
                "flowId": ctx.flow_id(),
                "elementId": self.core.id,
                "text_output": text_output,
                "proposed_transaction": proposed_transaction,
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_TEXT_OUTPUT.into(), text_output);
        outputs.insert(Self::PORT_PROPOSED_TRANSACTION.into(), proposed_transaction);
        Ok(self.core.set_outputs(outputs))
    }
}
