//! Random generator element
//!
//! # Parameters
//! - `type`: `string` (default), `int` or `float`
//! - `min`, `max`: inclusive range for numbers (default 0..=100)
//! - `decimal`: rounding for floats (default 2)
//! - `length`: length of strings (default 10)
//!
//! # Outputs
//! - `random_data`

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RandomSpec {
    #[serde(rename = "type")]
    pub data_type: String,
    pub min: f64,
    pub max: f64,
    pub decimal: u32,
    pub length: usize,
}

impl Default for RandomSpec {
    fn default() -> Self {
        Self {
            data_type: "string".to_string(),
            min: 0.0,
            max: 100.0,
            decimal: 2,
            length: 10,
        }
    }
}

impl RandomSpec {
    /// Draw one value. An empty range collapses to `min`.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        let (low, high) = if self.max < self.min {
            (self.min, self.min)
        } else {
            (self.min, self.max)
        };
        match self.data_type.as_str() {
            "int" => {
                let (low, high) = (low.ceil() as i64, high.floor() as i64);
                Value::from(if high < low { low } else { rng.gen_range(low..=high) })
            }
            "float" => {
                let raw = if high > low { rng.gen_range(low..=high) } else { low };
                let scale = 10f64.powi(self.decimal as i32);
                Value::from((raw * scale).round() / scale)
            }
            other => {
                if other != "string" {
                    log::warn!("Unknown random data type '{}', defaulting to string", other);
                }
                let text: String = rng
                    .sample_iter(&Alphanumeric)
                    .take(self.length)
                    .map(char::from)
                    .collect();
                Value::String(text)
            }
        }
    }
}

pub struct RandomGeneratorElement {
    core: ElementCore,
    spec: RandomSpec,
}

impl RandomGeneratorElement {
    pub const PORT_RANDOM_DATA: &'static str = "random_data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::RandomGenerator, def),
            spec: parse_params(def)?,
        })
    }
}

#[async_trait]
impl Element for RandomGeneratorElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!(
            "Executing random generator element: {} ({})",
            self.core.name,
            self.core.id
        );
        let random_data = self.spec.generate(&mut rand::thread_rng());

        ctx.emit(
            "random_generator",
            json!({
                "elementId": self.core.id,
                "type": self.spec.data_type,
                "random_data": random_data,
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_RANDOM_DATA.into(), random_data);
        Ok(self.core.set_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, Harness};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spec(value: Value) -> RandomSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let ints = spec(json!({"type": "int", "min": 3, "max": 5}));
        let floats = spec(json!({"type": "float", "min": 1, "max": 2, "decimal": 1}));
        for _ in 0..200 {
            let i = ints.generate(&mut rng).as_i64().unwrap();
            assert!((3..=5).contains(&i));
            let f = floats.generate(&mut rng).as_f64().unwrap();
            assert!((1.0..=2.0).contains(&f));
            assert_eq!((f * 10.0).round() / 10.0, f);
        }
    }

    #[test]
    fn test_strings() {
        let mut rng = StdRng::seed_from_u64(7);
        let text = spec(json!({"length": 16})).generate(&mut rng);
        let text = text.as_str().unwrap();
        assert_eq!(text.len(), 16);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));

        let fallback = spec(json!({"type": "uuid", "length": 4})).generate(&mut rng);
        assert_eq!(fallback.as_str().unwrap().len(), 4);
    }

    #[test]
    fn test_inverted_range_collapses() {
        let mut rng = StdRng::seed_from_u64(1);
        let value = spec(json!({"type": "int", "min": 9, "max": 2})).generate(&mut rng);
        assert_eq!(value, json!(9));
    }

    #[tokio::test]
    async fn test_execute_defaults_to_string() {
        let mut element =
            RandomGeneratorElement::new(&definition("r", ElementKind::RandomGenerator, json!({})))
                .unwrap();
        let harness = Harness::new();
        let outputs = harness.run(&mut element).await.unwrap();
        assert_eq!(outputs["random_data"].as_str().unwrap().len(), 10);
        assert_eq!(harness.events_of("random_generator")[0].data["type"], "string");
    }
}
