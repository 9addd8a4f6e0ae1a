//! Time element
//!
//! Reports the current time.
//!
//! # Parameters
//! - `type`: `string` (default), `int` (epoch seconds) or `float`
//! - `format`: pattern for strings, using `YYYY MM DD HH mm SS`
//! - `timezone`: `UTC`, `UTC+N` or `UTC-N`
//!
//! # Outputs
//! - `time_data`

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TimeParams {
    #[serde(rename = "type")]
    data_type: String,
    format: String,
    timezone: String,
}

impl Default for TimeParams {
    fn default() -> Self {
        Self {
            data_type: "string".to_string(),
            format: "YYYY-MM-DD HH:mm:SS".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Translate a `YYYY-MM-DD HH:mm:SS` style pattern into strftime.
pub fn strftime_pattern(format: &str) -> String {
    format
        .replace('%', "%%")
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("SS", "%S")
        .replace("ss", "%S")
}

/// Parse `UTC`, `UTC+N` or `UTC-N`; anything else is UTC with a warning.
pub fn parse_timezone(timezone: &str) -> FixedOffset {
    let offset = timezone
        .trim()
        .strip_prefix("UTC")
        .map(str::trim)
        .and_then(|rest| {
            if rest.is_empty() {
                Some(0)
            } else {
                rest.parse::<i32>().ok()
            }
        })
        .and_then(|hours: i32| hours.checked_mul(3600))
        .and_then(FixedOffset::east_opt);

    offset.unwrap_or_else(|| {
        log::warn!("Unknown timezone: {}, using UTC", timezone);
        Utc.fix()
    })
}

pub struct TimeElement {
    core: ElementCore,
    params: TimeParams,
}

impl TimeElement {
    pub const PORT_TIME_DATA: &'static str = "time_data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Time, def),
            params: parse_params(def)?,
        })
    }

    fn render(&self, now: DateTime<Utc>) -> Value {
        let local = now.with_timezone(&parse_timezone(&self.params.timezone));
        match self.params.data_type.as_str() {
            "int" => Value::from(local.timestamp()),
            "float" => Value::from(local.timestamp_millis() as f64 / 1000.0),
            "string" => {
                Value::String(local.format(&strftime_pattern(&self.params.format)).to_string())
            }
            other => {
                log::warn!("Unknown time data type '{}', defaulting to string", other);
                Value::String(local.to_rfc3339())
            }
        }
    }
}

#[async_trait]
impl Element for TimeElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing time block element: {} ({})", self.core.name, self.core.id);
        let time_data = self.render(Utc::now());

        ctx.emit(
            "time_block",
            json!({
                "elementId": self.core.id,
                "type": self.params.data_type,
                "format": self.params.format,
                "timezone": self.params.timezone,
                "time_data": time_data,
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_TIME_DATA.into(), time_data);
        Ok(self.core.set_outputs(outputs))
    }
}
