//! Transport-agnostic delivery of event envelopes
//!
//! The executor only ever calls [`StreamSink::send_message`] with serialised
//! envelopes. Three transports are provided:
//!
//! - [`WebSocketSink`] pushes to a remote websocket and reconnects on failure
//! - [`ChannelSink`] buffers into a queue pulled by a [`ChannelFeed`]
//! - [`DuplexSink`] writes into an already-open connection
//!
//! [`RecordingSink`] keeps messages in memory for tests and embedders.

mod channel;
mod duplex;
mod websocket;

pub use channel::{channel, ChannelFeed, ChannelSink};
pub use duplex::DuplexSink;
pub use websocket::WebSocketSink;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::FlowConfig;
use crate::error::Result;
use crate::events::FlowEvent;

/// Bounded reconnect behaviour for sinks that can reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts after the first failed send
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            backoff: Duration::from_millis(config.reconnect_backoff_ms),
        }
    }
}

/// Destination for ordered event text
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Open the underlying transport. Returns whether it is usable.
    async fn connect(&self) -> bool;

    /// Close the transport. Later sends fail unless the transport reconnects.
    async fn disconnect(&self);

    /// Deliver one message, best effort.
    ///
    /// Returns `false` once the transport has given up.
    async fn send_message(&self, message: &str) -> bool;

    /// Forward each chunk wrapped as `{type: "chunk", content, metadata}`.
    ///
    /// A failing chunk stream is reported with one `{type: "error"}` message
    /// and ends forwarding. Returns whether every message was delivered.
    async fn stream_chunks(&self, mut chunks: BoxStream<'_, Result<String>>, metadata: Value) -> bool {
        let mut delivered = true;
        while let Some(chunk) = chunks.next().await {
            let message = match chunk {
                Ok(content) => json!({
                    "type": "chunk",
                    "content": content,
                    "metadata": metadata,
                }),
                Err(e) => {
                    log::warn!("Chunk stream failed: {}", e);
                    let message = json!({
                        "type": "error",
                        "error": e.to_string(),
                        "metadata": metadata,
                    });
                    return self.send_message(&message.to_string()).await && delivered;
                }
            };
            delivered &= self.send_message(&message.to_string()).await;
        }
        delivered
    }
}

/// Keeps every delivered message in order.
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    open: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        }
    }

    /// Raw messages in receipt order
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Messages that parse as event envelopes, in receipt order
    pub fn events(&self) -> Vec<FlowEvent> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }

    /// Event type tags in receipt order
    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    /// Events of one type, in receipt order
    pub fn events_of(&self, event_type: &str) -> Vec<FlowEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl StreamSink for RecordingSink {
    async fn connect(&self) -> bool {
        self.open.store(true, Ordering::SeqCst);
        true
    }

    async fn disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, message: &str) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        self.messages.lock().push(message.to_string());
        true
    }
}
