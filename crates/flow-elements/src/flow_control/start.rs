//! Start element
//!
//! Entry point of a flow. Initial inputs are applied to it by the executor
//! and passed through unchanged.

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};

use crate::common::core_accessors;

pub struct StartElement {
    core: ElementCore,
}

impl StartElement {
    pub fn new(def: &ElementDefinition) -> Self {
        Self {
            core: ElementCore::from_definition(ElementKind::Start, def),
        }
    }
}

#[async_trait]
impl Element for StartElement {
    core_accessors!();

    async fn execute(&mut self, _ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing start element: {} ({})", self.core.name, self.core.id);
        let outputs = self.core.inputs.clone();
        Ok(self.core.set_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, inputs, Harness};
    use serde_json::json;

    #[tokio::test]
    async fn test_passes_inputs_through() {
        let mut start = StartElement::new(&definition("s", ElementKind::Start, json!({})));
        start.core_mut().inputs = inputs(json!({"chat_input": "hello", "n": 2}));

        let outputs = Harness::new().run(&mut start).await.unwrap();
        assert_eq!(outputs, inputs(json!({"chat_input": "hello", "n": 2})));
    }
}
