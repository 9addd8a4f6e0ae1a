//! REST API element
//!
//! Calls an HTTP endpoint and exposes the decoded response.
//!
//! # Parameters
//! - `url`, `method` (GET, POST, PUT or DELETE; default GET)
//! - `headers`: extra request headers
//! - `api_key`: sent as `Authorization: Bearer <key>`
//! - `body`: default payload when no `body`/`params` input is given
//!
//! # Inputs
//! - `body` or `params` (optional) - Payload: query pairs for GET/DELETE, a
//!   JSON body for POST/PUT
//!
//! # Outputs
//! - `data` - JSON response, or `{"text": ...}` when the body is not JSON

use std::collections::BTreeMap;

use async_trait::async_trait;
use flow_engine::events::is_sensitive_key;
use flow_engine::{
    AssemblyError, Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, FlowError,
    Result, ValueMap,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params, preview};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RestApiParams {
    url: String,
    method: String,
    headers: BTreeMap<String, String>,
    api_key: Option<String>,
    body: Option<Value>,
}

impl Default for RestApiParams {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            api_key: None,
            body: None,
        }
    }
}

pub struct RestApiElement {
    core: ElementCore,
    url: String,
    method: Method,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
}

impl RestApiElement {
    pub const PORT_BODY: &'static str = "body";
    pub const PORT_PARAMS: &'static str = "params";
    pub const PORT_DATA: &'static str = "data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: RestApiParams = parse_params(def)?;
        let method = match params.method.to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            other => {
                return Err(AssemblyError::InvalidParameters {
                    element_id: def.element_id.clone(),
                    message: format!("Unsupported HTTP method: {}", other),
                }
                .into())
            }
        };

        let mut headers = params.headers;
        if let Some(key) = params.api_key.filter(|k| !k.is_empty()) {
            headers.insert("Authorization".to_string(), format!("Bearer {}", key));
        }

        Ok(Self {
            core: ElementCore::from_definition(ElementKind::RestApi, def),
            url: params.url,
            method,
            headers,
            body: params.body,
        })
    }

    fn payload(&self) -> Value {
        self.core
            .input(Self::PORT_BODY)
            .or_else(|| self.core.input(Self::PORT_PARAMS))
            .cloned()
            .or_else(|| self.body.clone())
            .unwrap_or_else(|| Value::Object(ValueMap::new()))
    }

    fn safe_headers(&self) -> Value {
        self.headers
            .iter()
            .map(|(k, v)| {
                let hidden = is_sensitive_key(k) || k.to_lowercase().contains("auth");
                let v = if hidden { "********".to_string() } else { v.clone() };
                (k.clone(), Value::String(v))
            })
            .collect::<ValueMap>()
            .into()
    }

    async fn send(&self, ctx: &ExecutionContext<'_>, payload: &Value) -> Result<(u16, Value)> {
        let client = reqwest::Client::builder()
            .timeout(ctx.config().http_timeout())
            .build()
            .map_err(|e| FlowError::external(format!("Failed to build HTTP client: {}", e)))?;

        let mut request = client.request(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = if self.method == Method::GET || self.method == Method::DELETE {
            request.query(&query_pairs(payload))
        } else {
            request.json(payload)
        };

        let response = request
            .send()
            .await
            .map_err(|e| FlowError::external(format!("Error making API request: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FlowError::external(format!("Error reading API response: {}", e)))?;

        if !status.is_success() {
            return Err(FlowError::external(format!(
                "HTTP error {} from API: {}",
                status.as_u16(),
                text
            )));
        }

        let data = serde_json::from_str(&text).unwrap_or_else(|_| json!({"text": text}));
        Ok((status.as_u16(), data))
    }
}

fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl Element for RestApiElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing REST API element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let payload = self.payload();
        ctx.emit(
            "api_request",
            json!({
                "elementId": self.core.id,
                "url": self.url,
                "method": self.method.as_str(),
                "headers": self.safe_headers(),
                "params": flow_engine::events::redact_sensitive(&payload),
            }),
        )
        .await;

        match self.send(ctx, &payload).await {
            Ok((status_code, data)) => {
                ctx.emit(
                    "api_response",
                    json!({
                        "elementId": self.core.id,
                        "status_code": status_code,
                        "response_preview": preview(&data),
                    }),
                )
                .await;
                let mut outputs = ValueMap::new();
                outputs.insert(Self::PORT_DATA.into(), data);
                Ok(self.core.set_outputs(outputs))
            }
            Err(e) => {
                log::error!("REST API element {} failed: {}", self.core.id, e);
                ctx.emit(
                    "api_error",
                    json!({"elementId": self.core.id, "error": e.to_string()}),
                )
                .await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, serve, Harness};

    #[tokio::test]
    async fn test_get_with_query_and_bearer() {
        let (url, server) = serve(vec![(200, r#"{"price": 8.5}"#.to_string())]).await;
        let mut element = RestApiElement::new(&definition(
            "api",
            ElementKind::RestApi,
            json!({"url": format!("{}/quote", url), "api_key": "sk-123456789"}),
        ))
        .unwrap();
        element.core_mut().set_input("params", json!({"symbol": "APT"}));

        let harness = Harness::new();
        let outputs = harness.run(&mut element).await.unwrap();
        assert_eq!(outputs["data"], json!({"price": 8.5}));

        let request = server.await.unwrap().remove(0);
        assert!(request.starts_with("GET /quote?symbol=APT"));
        assert!(request.to_lowercase().contains("authorization: bearer sk-123456789"));

        let sent = &harness.events_of("api_request")[0];
        assert_eq!(sent.data["headers"]["Authorization"], "********");
        assert_eq!(harness.events_of("api_response")[0].data["status_code"], 200);
    }

    #[tokio::test]
    async fn test_post_body_and_text_response() {
        let (url, server) = serve(vec![(201, "created".to_string())]).await;
        let mut element = RestApiElement::new(&definition(
            "api",
            ElementKind::RestApi,
            json!({"url": url, "method": "post", "body": {"name": "n"}}),
        ))
        .unwrap();

        let outputs = Harness::new().run(&mut element).await.unwrap();
        assert_eq!(outputs["data"], json!({"text": "created"}));
        let request = server.await.unwrap().remove(0);
        assert!(request.starts_with("POST /"));
        assert!(request.ends_with(r#"{"name":"n"}"#));
    }

    #[tokio::test]
    async fn test_error_status_is_external_call_error() {
        let (url, _server) = serve(vec![(503, r#"{"busy": true}"#.to_string())]).await;
        let mut element =
            RestApiElement::new(&definition("api", ElementKind::RestApi, json!({"url": url})))
                .unwrap();

        let harness = Harness::new();
        let err = harness.run(&mut element).await.unwrap_err();
        assert_eq!(err.kind(), "external_call_error");
        assert!(err.to_string().contains("503"));
        assert_eq!(harness.events_of("api_error").len(), 1);
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let result = RestApiElement::new(&definition(
            "api",
            ElementKind::RestApi,
            json!({"url": "http://x", "method": "PATCH"}),
        ));
        assert!(result.is_err());
    }
}
