//! Chain provider backed by the Aptos node REST API

use std::time::Duration;

use async_trait::async_trait;
use flow_engine::{ChainProvider, FlowError, Result};
use serde_json::{json, Value};

const MAX_GAS_AMOUNT: &str = "2000";
const GAS_UNIT_PRICE: &str = "100";
const EXPIRATION_SECS: i64 = 600;

/// Talks to `{node}/v1/...` with a shared reqwest client.
pub struct AptosRestClient {
    client: reqwest::Client,
}

impl AptosRestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::external(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn endpoint(node_url: &str, path: &str) -> String {
        format!("{}/v1/{}", node_url.trim_end_matches('/'), path)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FlowError::external(format!("Error reading node response: {}", e)))?;
        if !status.is_success() {
            return Err(FlowError::external(format!(
                "Node returned {}: {}",
                status.as_u16(),
                text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| FlowError::external(format!("Node returned invalid JSON: {}", e)))
    }

    /// Current sequence number of an account
    pub async fn sequence_number(&self, node_url: &str, address: &str) -> Result<String> {
        let response = self
            .client
            .get(Self::endpoint(node_url, &format!("accounts/{}", address)))
            .send()
            .await
            .map_err(|e| FlowError::external(format!("Error fetching account: {}", e)))?;
        let account = Self::read_json(response).await?;
        match account.get("sequence_number") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(FlowError::external(format!(
                "Account {} has no sequence number",
                address
            ))),
        }
    }
}

#[async_trait]
impl ChainProvider for AptosRestClient {
    async fn view(
        &self,
        node_url: &str,
        function: &str,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value> {
        let response = self
            .client
            .post(Self::endpoint(node_url, "view"))
            .json(&json!({
                "function": function,
                "type_arguments": type_arguments,
                "arguments": arguments,
            }))
            .send()
            .await
            .map_err(|e| FlowError::external(format!("Error calling view function: {}", e)))?;
        Self::read_json(response).await
    }

    async fn build_transaction(
        &self,
        node_url: &str,
        sender: &str,
        function: &str,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value> {
        let sequence_number = self.sequence_number(node_url, sender).await?;
        let expiration = chrono::Utc::now().timestamp() + EXPIRATION_SECS;
        Ok(json!({
            "sender": sender,
            "sequence_number": sequence_number,
            "max_gas_amount": MAX_GAS_AMOUNT,
            "gas_unit_price": GAS_UNIT_PRICE,
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": function,
                "type_arguments": type_arguments,
                "arguments": arguments,
            },
        }))
    }
}
