//! Scripted text generator for element tests

use async_trait::async_trait;
use flow_engine::{FlowError, GenerationRequest, Result, TextGenerator};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::Mutex;

/// Replies with fixed chunks, or fails, and remembers the last request.
pub(crate) struct Scripted {
    chunks: Vec<String>,
    fail: bool,
    last: Mutex<Option<GenerationRequest>>,
}

impl Scripted {
    pub fn chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail: false,
            last: Mutex::new(None),
        }
    }

    pub fn reply(text: &str) -> Self {
        Self::chunks(&[text])
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::chunks(&[])
        }
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last.lock().clone()
    }

    fn record(&self, request: &GenerationRequest) -> Result<()> {
        *self.last.lock() = Some(request.clone());
        if self.fail {
            return Err(FlowError::external("provider unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.record(request)?;
        Ok(self.chunks.concat())
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        self.record(request)?;
        Ok(stream::iter(self.chunks.clone().into_iter().map(Ok)).boxed())
    }
}
