//! Merger element
//!
//! Combines two values into one.
//!
//! # Inputs
//! - `data1`, `data2` - Values to merge
//!
//! # Outputs
//! - `merged_data` - See [`merge`] for the rules

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde_json::{json, Number, Value};

use crate::common::{core_accessors, preview};

pub struct MergerElement {
    core: ElementCore,
}

impl MergerElement {
    pub const PORT_DATA1: &'static str = "data1";
    pub const PORT_DATA2: &'static str = "data2";
    pub const PORT_MERGED_DATA: &'static str = "merged_data";

    pub fn new(def: &ElementDefinition) -> Self {
        Self {
            core: ElementCore::from_definition(ElementKind::Merger, def),
        }
    }
}

/// Merge two values.
///
/// Null yields the other side. Objects merge recursively, lists and strings
/// concatenate, numbers add and booleans are ORed. Two scalars of different
/// types are concatenated as text; any other pairing takes `b`.
pub fn merge(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => other.clone(),
        (Value::Object(left), Value::Object(right)) => {
            let mut result = left.clone();
            for (key, value) in right {
                let merged = match (result.get(key), value) {
                    (Some(existing @ Value::Object(_)), Value::Object(_)) => merge(existing, value),
                    _ => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Value::Object(result)
        }
        (Value::Array(left), Value::Array(right)) => {
            Value::Array(left.iter().chain(right).cloned().collect())
        }
        (Value::String(left), Value::String(right)) => Value::String(format!("{}{}", left, right)),
        (Value::Bool(left), Value::Bool(right)) => Value::Bool(*left || *right),
        (Value::Number(left), Value::Number(right)) => Value::Number(add(left, right)),
        (left, right) if is_scalar(left) && is_scalar(right) => {
            Value::String(format!("{}{}", scalar_text(left), scalar_text(right)))
        }
        (_, right) => {
            log::warn!("Cannot merge mismatched data types, using data2");
            right.clone()
        }
    }
}

fn add(left: &Number, right: &Number) -> Number {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        if let Some(sum) = l.checked_add(r) {
            return sum.into();
        }
    }
    let sum = left.as_f64().unwrap_or(0.0) + right.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).unwrap_or_else(|| 0.into())
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Element for MergerElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing merger element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let empty = Value::Object(ValueMap::new());
        let data1 = self.core.input(Self::PORT_DATA1).unwrap_or(&empty);
        let data2 = self.core.input(Self::PORT_DATA2).unwrap_or(&empty);
        let merged = merge(data1, data2);

        ctx.emit(
            "merger",
            json!({
                "elementId": self.core.id,
                "merged_data_preview": preview(&merged),
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_MERGED_DATA.into(), merged);
        Ok(self.core.set_outputs(outputs))
    }
}
