//! Capability interfaces for external collaborators
//!
//! Model providers and chain nodes are not part of the engine. Elements reach
//! them only through these traits, injected per run via
//! [`ExecutorExtensions`](crate::ExecutorExtensions).

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One text generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text and structured-output generation provider
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the full completion at once
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate the completion as a stream of chunks.
    ///
    /// Providers without native streaming yield the whole completion as a
    /// single chunk.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let text = self.generate(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

/// Read and transaction-building access to a chain node
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Call a view function and return its decoded result
    async fn view(
        &self,
        node_url: &str,
        function: &str,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value>;

    /// Build an unsigned transaction payload for an entry function
    async fn build_transaction(
        &self,
        node_url: &str,
        sender: &str,
        function: &str,
        type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value>;
}
