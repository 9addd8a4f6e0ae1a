//! Metadata element
//!
//! Provides user and environment metadata (wallet, user id, command, ...).
//! Configured `data` is merged with the inputs, inputs winning, and required
//! output fields with a declared default are filled in.
//!
//! The emitted `metadata` event masks sensitive fields.

use async_trait::async_trait;
use flow_engine::events::redact_sensitive;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataParams {
    data: ValueMap,
}

pub struct MetadataElement {
    core: ElementCore,
    data: ValueMap,
}

impl MetadataElement {
    pub const FIELD_COMMAND: &'static str = "command";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: MetadataParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Metadata, def),
            data: params.data,
        })
    }

    fn collect(&self) -> ValueMap {
        let mut metadata = self.data.clone();
        for (key, value) in &self.core.inputs {
            metadata.insert(key.clone(), value.clone());
        }

        for (key, spec) in &self.core.output_schema {
            if metadata.contains_key(key) || !spec.required {
                continue;
            }
            if let Some(default) = spec.default.as_ref().filter(|d| !d.is_null()) {
                metadata.insert(key.clone(), default.clone());
            }
        }

        if !metadata.contains_key(Self::FIELD_COMMAND) {
            let first_option = self
                .core
                .output_schema
                .get(Self::FIELD_COMMAND)
                .and_then(|spec| spec.option.as_ref())
                .and_then(|options| options.first());
            if let Some(command) = first_option {
                metadata.insert(Self::FIELD_COMMAND.into(), command.clone());
            }
        }

        metadata
    }
}

#[async_trait]
impl Element for MetadataElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing metadata element: {} ({})", self.core.name, self.core.id);
        let metadata = self.collect();

        ctx.emit(
            "metadata",
            json!({
                "elementId": self.core.id,
                "metadata": redact_sensitive(&Value::Object(metadata.clone())),
            }),
        )
        .await;

        Ok(self.core.set_outputs(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, Harness};
    use flow_engine::{FieldSpec, FieldType};

    fn element() -> MetadataElement {
        let mut def = definition(
            "meta",
            ElementKind::Metadata,
            json!({"data": {"user_id": "u-1", "wallet_address": "0x1234567890abcdef"}}),
        );
        def.output_schema.insert(
            "command".into(),
            FieldSpec {
                option: Some(vec![json!("swap"), json!("stake")]),
                ..FieldSpec::optional(FieldType::String)
            },
        );
        def.output_schema.insert(
            "network".into(),
            FieldSpec::required(FieldType::String).with_default(json!("testnet")),
        );
        MetadataElement::new(&def).unwrap()
    }

    #[tokio::test]
    async fn test_merges_and_fills_defaults() {
        let mut meta = element();
        meta.core_mut().set_input("user_id", json!("u-2"));

        let harness = Harness::new();
        let outputs = harness.run(&mut meta).await.unwrap();
        assert_eq!(outputs["user_id"], "u-2");
        assert_eq!(outputs["network"], "testnet");
        assert_eq!(outputs["command"], "swap");
        assert_eq!(outputs["wallet_address"], "0x1234567890abcdef");

        let event = &harness.events_of("metadata")[0];
        assert_eq!(event.data["metadata"]["wallet_address"], "0x12...cdef");
        assert_eq!(event.data["metadata"]["user_id"], "u-2");
    }

    #[tokio::test]
    async fn test_explicit_command_kept() {
        let mut meta = element();
        meta.core_mut().set_input("command", json!("stake"));
        let outputs = Harness::new().run(&mut meta).await.unwrap();
        assert_eq!(outputs["command"], "stake");
    }
}
