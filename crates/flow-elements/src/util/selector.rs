//! Selector element
//!
//! Picks values out of structured data by key.
//!
//! # Parameters
//! - `key`: a single key, or a list of keys
//!
//! # Inputs
//! - `data` - An object, a list of objects, or a plain list (indexed by `key`)
//!
//! # Outputs
//! - `value` - The selection; null when nothing matches

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

/// A single key or a list of keys
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SelectorKey {
    Many(Vec<String>),
    One(Value),
}

impl Default for SelectorKey {
    fn default() -> Self {
        Self::One(Value::String(String::new()))
    }
}

impl SelectorKey {
    fn to_json(&self) -> Value {
        match self {
            Self::Many(keys) => json!(keys),
            Self::One(key) => key.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SelectorParams {
    key: SelectorKey,
}

pub struct SelectorElement {
    core: ElementCore,
    key: SelectorKey,
}

impl SelectorElement {
    pub const PORT_DATA: &'static str = "data";
    pub const PORT_VALUE: &'static str = "value";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: SelectorParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Selector, def),
            key: params.key,
        })
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pick(item: &ValueMap, keys: &[String]) -> ValueMap {
    keys.iter()
        .filter_map(|k| item.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

fn all_objects(items: &[Value]) -> bool {
    items.iter().all(Value::is_object)
}

/// Apply a selector key to data.
pub fn select(data: &Value, key: &SelectorKey) -> Value {
    match (key, data) {
        (SelectorKey::Many(keys), Value::Object(map)) => Value::Object(pick(map, keys)),
        (SelectorKey::Many(keys), Value::Array(items)) if all_objects(items) => Value::Array(
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| pick(item, keys))
                .filter(|picked| !picked.is_empty())
                .map(Value::Object)
                .collect(),
        ),
        (SelectorKey::Many(keys), other) => {
            log::warn!("Cannot select keys {:?} from {}", keys, type_name(other));
            Value::Object(ValueMap::new())
        }
        (SelectorKey::One(key), Value::Object(map)) => {
            map.get(&key_string(key)).cloned().unwrap_or(Value::Null)
        }
        (SelectorKey::One(key), Value::Array(items)) if all_objects(items) => {
            let key = key_string(key);
            Value::Array(
                items
                    .iter()
                    .filter_map(|item| item.get(&key).cloned())
                    .collect(),
            )
        }
        (SelectorKey::One(key), Value::Array(items)) => {
            let index = match key {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match index {
                Some(i) if i >= 0 => items.get(i as usize).cloned().unwrap_or(Value::Null),
                Some(_) => Value::Null,
                None => {
                    log::warn!("Cannot use key {} as index for list", key);
                    Value::Null
                }
            }
        }
        (SelectorKey::One(_), _) => Value::Null,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Element for SelectorElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing selector element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let data = self
            .core
            .input(Self::PORT_DATA)
            .cloned()
            .unwrap_or_else(|| Value::Object(ValueMap::new()));
        let value = select(&data, &self.key);

        ctx.emit(
            "selector",
            json!({
                "elementId": self.core.id,
                "key": self.key.to_json(),
                "selected_value": value,
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_VALUE.into(), value);
        Ok(self.core.set_outputs(outputs))
    }
}
