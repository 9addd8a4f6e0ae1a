//! Run configuration
//!
//! A flow run receives a flattened configuration map: process settings merged
//! with per-request overrides. [`FlowConfig`] gives the keys the engine and
//! the built-in elements understand typed accessors and defaults, and keeps
//! everything else in `extra`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::ValueMap;
use crate::error::{FlowError, Result};

/// Default values for configuration keys
pub mod defaults {
    pub const CUSTOM_CODE_MAX_MEMORY_MB: u64 = 100;
    pub const CUSTOM_CODE_MAX_CPU_SECONDS: f64 = 10.0;
    pub const CUSTOM_CODE_POLL_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_MODEL_ID: &str = "DeepSeek R1 AWS";
    pub const APTOS_NODE_URL: &str = "https://testnet.aptoslabs.com";
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
    pub const RECONNECT_BACKOFF_MS: u64 = 1000;
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
}

/// Flattened configuration for one flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Custom-code elements fail closed unless this is set
    pub allow_custom_code: bool,
    pub custom_code_max_memory_mb: u64,
    /// Wall-clock ceiling for one custom-code worker
    pub custom_code_max_cpu_seconds: f64,
    pub custom_code_poll_interval_ms: u64,
    /// Sandbox worker binary; defaults to a sibling of the current executable
    pub custom_code_worker_path: Option<PathBuf>,
    /// Chain reads and transaction building fail closed unless this is set
    pub enable_blockchain: bool,
    pub default_model_id: String,
    pub aptos_node_url: String,
    pub aptos_sender_address: Option<String>,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
    pub http_timeout_secs: u64,
    /// Keys the engine does not interpret
    #[serde(flatten)]
    pub extra: ValueMap,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            allow_custom_code: false,
            custom_code_max_memory_mb: defaults::CUSTOM_CODE_MAX_MEMORY_MB,
            custom_code_max_cpu_seconds: defaults::CUSTOM_CODE_MAX_CPU_SECONDS,
            custom_code_poll_interval_ms: defaults::CUSTOM_CODE_POLL_INTERVAL_MS,
            custom_code_worker_path: None,
            enable_blockchain: true,
            default_model_id: defaults::DEFAULT_MODEL_ID.to_string(),
            aptos_node_url: defaults::APTOS_NODE_URL.to_string(),
            aptos_sender_address: None,
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
            reconnect_backoff_ms: defaults::RECONNECT_BACKOFF_MS,
            http_timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            extra: ValueMap::new(),
        }
    }
}

impl FlowConfig {
    /// Read a flattened configuration map.
    ///
    /// Missing keys take their defaults; a known key with the wrong type is
    /// a configuration error.
    pub fn from_map(map: ValueMap) -> Result<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| FlowError::config(format!("Invalid configuration: {}", e)))
    }

    /// Read known keys from upper-cased environment variables.
    ///
    /// `ALLOW_CUSTOM_CODE=true` sets `allow_custom_code`, and so on. Values
    /// that parse as booleans or numbers are typed accordingly.
    pub fn from_env() -> Result<Self> {
        let mut map = ValueMap::new();
        for key in Self::known_keys() {
            if let Ok(raw) = std::env::var(key.to_uppercase()) {
                map.insert(key, parse_env_value(&raw));
            }
        }
        Self::from_map(map)
    }

    /// Merge request-level overrides over these settings.
    pub fn with_overrides(&self, overrides: &ValueMap) -> Result<Self> {
        let mut map = self.to_map()?;
        for (key, value) in overrides {
            map.insert(key.clone(), value.clone());
        }
        Self::from_map(map)
    }

    /// Flatten back into a configuration map
    pub fn to_map(&self) -> Result<ValueMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(FlowError::config("Configuration did not serialise to a map")),
        }
    }

    /// Look up a key the engine does not interpret
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Wall-clock ceiling for one sandbox worker; out-of-range values
    /// saturate at `Duration::MAX`
    pub fn custom_code_time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.custom_code_max_cpu_seconds.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    pub fn custom_code_poll_interval(&self) -> Duration {
        Duration::from_millis(self.custom_code_poll_interval_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn known_keys() -> Vec<String> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ValueMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert!(!config.allow_custom_code);
        assert_eq!(config.custom_code_max_memory_mb, 100);
        assert_eq!(config.custom_code_time_limit(), Duration::from_secs(10));
        assert_eq!(config.custom_code_poll_interval(), Duration::from_millis(100));
        assert!(config.enable_blockchain);
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_from_map_keeps_unknown_keys() {
        let config = FlowConfig::from_map(map(json!({
            "allow_custom_code": true,
            "custom_code_max_cpu_seconds": 2,
            "aws_region": "us-west-2"
        })))
        .unwrap();
        assert!(config.allow_custom_code);
        assert_eq!(config.custom_code_time_limit(), Duration::from_secs(2));
        assert_eq!(config.get("aws_region"), Some(&json!("us-west-2")));
        assert_eq!(config.custom_code_max_memory_mb, 100);
    }

    #[test]
    fn test_huge_time_limit_saturates() {
        let config =
            FlowConfig::from_map(map(json!({"custom_code_max_cpu_seconds": 1e300}))).unwrap();
        assert_eq!(config.custom_code_time_limit(), Duration::MAX);

        let negative =
            FlowConfig::from_map(map(json!({"custom_code_max_cpu_seconds": -5}))).unwrap();
        assert_eq!(negative.custom_code_time_limit(), Duration::ZERO);
    }

    #[test]
    fn test_wrong_type_is_configuration_error() {
        let err = FlowConfig::from_map(map(json!({"allow_custom_code": "sometimes"}))).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn test_overrides_win() {
        let base = FlowConfig {
            enable_blockchain: true,
            ..Default::default()
        };
        let merged = base
            .with_overrides(&map(json!({"enable_blockchain": false, "user_id": "u1"})))
            .unwrap();
        assert!(!merged.enable_blockchain);
        assert_eq!(merged.get("user_id"), Some(&json!("u1")));
        assert!(base.enable_blockchain);
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value("TRUE"), json!(true));
        assert_eq!(parse_env_value("42"), json!(42));
        assert_eq!(parse_env_value("0.5"), json!(0.5));
        assert_eq!(parse_env_value(" /usr/bin/worker "), json!("/usr/bin/worker"));
    }

    #[test]
    fn test_known_keys_exclude_extra() {
        let keys = FlowConfig::known_keys();
        assert!(keys.contains(&"allow_custom_code".to_string()));
        assert!(!keys.contains(&"extra".to_string()));
    }
}
