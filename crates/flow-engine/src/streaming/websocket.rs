//! Push sink for a remote websocket endpoint

use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{ReconnectPolicy, StreamSink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pushes every message to a remote websocket.
///
/// A failed send drops the connection and retries on a fresh one, up to
/// `policy.max_attempts` times with a fixed wait in between.
pub struct WebSocketSink {
    url: String,
    policy: ReconnectPolicy,
    stream: Mutex<Option<WsStream>>,
}

impl WebSocketSink {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
            stream: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self, slot: &mut Option<WsStream>) -> bool {
        if slot.is_some() {
            return true;
        }
        match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((stream, _)) => {
                log::info!("Connected stream sink to {}", self.url);
                *slot = Some(stream);
                true
            }
            Err(e) => {
                log::warn!("Failed to connect stream sink to {}: {}", self.url, e);
                false
            }
        }
    }
}

#[async_trait]
impl StreamSink for WebSocketSink {
    async fn connect(&self) -> bool {
        let mut slot = self.stream.lock().await;
        self.open(&mut slot).await
    }

    async fn disconnect(&self) {
        let mut slot = self.stream.lock().await;
        if let Some(mut stream) = slot.take() {
            if let Err(e) = stream.close(None).await {
                log::debug!("Error closing stream sink to {}: {}", self.url, e);
            }
            log::info!("Disconnected stream sink from {}", self.url);
        }
    }

    async fn send_message(&self, message: &str) -> bool {
        let mut slot = self.stream.lock().await;

        for attempt in 0..=self.policy.max_attempts {
            if attempt > 0 {
                log::debug!(
                    "Reconnecting stream sink to {} (attempt {}/{})",
                    self.url,
                    attempt,
                    self.policy.max_attempts
                );
                tokio::time::sleep(self.policy.backoff).await;
            }

            if !self.open(&mut slot).await {
                continue;
            }
            let Some(stream) = slot.as_mut() else {
                continue;
            };

            let sent = stream.send(WsMessage::Text(message.to_string().into())).await;
            match sent {
                Ok(()) => return true,
                Err(e) => {
                    log::warn!("Send to {} failed: {}", self.url, e);
                    *slot = None;
                }
            }
        }

        log::error!(
            "Giving up on stream sink {} after {} reconnect attempts",
            self.url,
            self.policy.max_attempts
        );
        false
    }
}
