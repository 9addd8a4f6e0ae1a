//! Queue-buffered sink for request/response streaming endpoints
//!
//! The producer side is a [`ChannelSink`] handed to the executor; the
//! consumer side is a [`ChannelFeed`] that an HTTP handler drains, e.g. as a
//! server-sent events body.

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::StreamSink;

/// Create a bounded sink/feed pair.
///
/// Senders wait when `capacity` messages are queued and unread.
pub fn channel(capacity: usize) -> (ChannelSink, ChannelFeed) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelSink {
            tx: Mutex::new(Some(tx)),
        },
        ChannelFeed { rx },
    )
}

/// Producer half of a queue-buffered stream
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

#[async_trait]
impl StreamSink for ChannelSink {
    async fn connect(&self) -> bool {
        self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    async fn disconnect(&self) {
        self.tx.lock().take();
    }

    async fn send_message(&self, message: &str) -> bool {
        let Some(tx) = self.tx.lock().clone() else {
            return false;
        };
        match tx.send(message.to_string()).await {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Stream feed was dropped; message discarded");
                false
            }
        }
    }
}

/// Consumer half of a queue-buffered stream
pub struct ChannelFeed {
    rx: mpsc::Receiver<String>,
}

impl ChannelFeed {
    /// Next queued message; `None` once the sink is gone and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Adapt the feed into a `Stream` of messages
    pub fn into_stream(self) -> impl Stream<Item = String> + Send {
        stream::unfold(self, |mut feed| async move {
            feed.recv().await.map(|msg| (msg, feed))
        })
    }
}
