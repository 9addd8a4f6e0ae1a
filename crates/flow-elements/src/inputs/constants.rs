//! Constants element
//!
//! Provides a fixed value coerced to a declared type. A value that cannot be
//! coerced falls back to the type's zero value.
//!
//! # Parameters
//! - `data_type`: `string` (default), `int`, `float`, `bool`, `json`, `list`
//! - `data`: the value
//!
//! # Outputs
//! - `data`

use async_trait::async_trait;
use flow_engine::schema::coerce_value;
use flow_engine::{
    Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, FieldType, Result,
    ValueMap,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params, preview};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConstantsParams {
    data_type: FieldType,
    data: Value,
}

impl Default for ConstantsParams {
    fn default() -> Self {
        Self {
            data_type: FieldType::String,
            data: Value::Null,
        }
    }
}

pub struct ConstantsElement {
    core: ElementCore,
    data_type: FieldType,
    data: Value,
}

impl ConstantsElement {
    pub const PORT_DATA: &'static str = "data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: ConstantsParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Constants, def),
            data_type: params.data_type,
            data: params.data,
        })
    }

    /// The configured value as the declared type, or the type's default
    pub fn value(&self) -> Value {
        if self.data.is_null() {
            return self.data_type.default_value();
        }
        let coerced = coerce_value(&self.data, &self.data_type);
        if self.data_type.matches(&coerced) {
            coerced
        } else {
            log::error!(
                "Constant in element {} is not a valid '{}', using default",
                self.core.id,
                self.data_type
            );
            self.data_type.default_value()
        }
    }
}

#[async_trait]
impl Element for ConstantsElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing constants element: {} ({})", self.core.name, self.core.id);
        let data = self.value();

        ctx.emit(
            "constant",
            json!({
                "elementId": self.core.id,
                "data_type": self.data_type.to_string(),
                "data_preview": preview(&data),
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_DATA.into(), data);
        Ok(self.core.set_outputs(outputs))
    }
}
