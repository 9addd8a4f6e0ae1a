//! Event envelopes for streaming flow progress
//!
//! Every event leaves the engine as `{type, timestamp, data}` text through a
//! [`StreamSink`]. Lifecycle events are produced by the executor; elements
//! add their own diagnostic events through the execution context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::streaming::StreamSink;

/// Well-known event type tags
pub mod event_types {
    pub const FLOW_STARTED: &str = "flow_started";
    pub const FLOW_COMPLETED: &str = "flow_completed";
    pub const FLOW_ERROR: &str = "flow_error";
    pub const ELEMENT_STARTED: &str = "element_started";
    pub const ELEMENT_COMPLETED: &str = "element_completed";
    pub const ELEMENT_ERROR: &str = "element_error";
}

/// Maximum length of code and output previews in diagnostic events
pub const PREVIEW_LIMIT: usize = 1000;

/// Envelope sent to sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub data: Value,
}

impl FlowEvent {
    /// Create an event stamped with the current time
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: now_seconds(),
            data,
        }
    }

    /// Element id carried in the payload, if any
    pub fn element_id(&self) -> Option<&str> {
        self.data
            .get("elementId")
            .or_else(|| self.data.get("element_id"))
            .and_then(Value::as_str)
    }
}

/// Current wall-clock time as fractional epoch seconds
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Serialises events and hands them to the attached sink.
///
/// Delivery failures are logged and swallowed; they never fail a run.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sink: Option<Arc<dyn StreamSink>>,
}

impl EventEmitter {
    pub fn new(sink: Option<Arc<dyn StreamSink>>) -> Self {
        Self { sink }
    }

    /// An emitter that drops every event
    pub fn detached() -> Self {
        Self { sink: None }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn sink(&self) -> Option<&Arc<dyn StreamSink>> {
        self.sink.as_ref()
    }

    /// Stamp and send one event.
    ///
    /// Returns whether the sink accepted it; `false` when no sink is
    /// attached.
    pub async fn emit(&self, event_type: &str, data: Value) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };

        let event = FlowEvent::new(event_type, data);
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to serialise '{}' event: {}", event_type, e);
                return false;
            }
        };

        let delivered = sink.send_message(&text).await;
        if !delivered {
            log::warn!("Sink did not accept '{}' event", event_type);
        }
        delivered
    }
}

/// Truncate text for a diagnostic preview, marking the cut with `...`.
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

/// Preview of a JSON value's compact text form.
pub fn preview_value(value: &Value, limit: usize) -> String {
    preview(&value.to_string(), limit)
}

const SENSITIVE_KEYS: [&str; 7] = [
    "wallet", "address", "private", "secret", "key", "token", "password",
];

/// Whether a field name looks like it holds a credential or identifier
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| lowered.contains(s))
}

/// Mask a sensitive string, keeping four characters at each end when long
/// enough.
pub fn mask(value: &Value) -> Value {
    match value.as_str() {
        Some(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}...{}", head, tail))
        }
        _ => Value::String("********".to_string()),
    }
}

/// Redact sensitive top-level fields of an object.
///
/// Non-object values are returned unchanged.
pub fn redact_sensitive(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) { mask(v) } else { v.clone() };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
