//! Sink over an already-open duplex connection

use std::fmt::Display;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;

use super::StreamSink;

/// Writes frames straight into the write half of an open connection, such as
/// a websocket accepted by the caller's server.
///
/// The connection belongs to the peer, so there is nothing to reconnect to:
/// the first failed write closes the sink for good.
pub struct DuplexSink<S, M = String> {
    inner: Mutex<Option<S>>,
    _frame: PhantomData<fn(String) -> M>,
}

impl<S, M> DuplexSink<S, M>
where
    S: Sink<M> + Unpin + Send,
    S::Error: Display,
    M: From<String> + Send,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner: Mutex::new(Some(inner)),
            _frame: PhantomData,
        }
    }

    /// Take back the underlying connection, if it is still open
    pub fn into_inner(self) -> Option<S> {
        self.inner.into_inner()
    }
}

#[async_trait]
impl<S, M> StreamSink for DuplexSink<S, M>
where
    S: Sink<M> + Unpin + Send,
    S::Error: Display,
    M: From<String> + Send,
{
    async fn connect(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    async fn disconnect(&self) {
        if let Some(mut inner) = self.inner.lock().await.take() {
            if let Err(e) = inner.close().await {
                log::debug!("Error closing duplex connection: {}", e);
            }
        }
    }

    async fn send_message(&self, message: &str) -> bool {
        let mut slot = self.inner.lock().await;
        let Some(inner) = slot.as_mut() else {
            return false;
        };
        let sent = inner.send(M::from(message.to_string())).await;
        match sent {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Duplex connection write failed, closing sink: {}", e);
                *slot = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    /// In-memory write half that can be told to fail.
    #[derive(Clone, Default)]
    struct Frames {
        written: Arc<parking_lot::Mutex<Vec<String>>>,
        broken: bool,
    }

    impl Sink<String> for Frames {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
            if self.broken {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "peer went away",
                ));
            }
            self.written.lock().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writes_frames_in_order() {
        let frames = Frames::default();
        let sink: DuplexSink<Frames> = DuplexSink::new(frames.clone());
        assert!(sink.connect().await);
        assert!(sink.send_message("one").await);
        assert!(sink.send_message("two").await);

        assert_eq!(
            *frames.written.lock(),
            vec!["one".to_string(), "two".to_string()]
        );
        assert!(sink.into_inner().is_some());
    }

    #[tokio::test]
    async fn test_failed_write_closes_sink() {
        let frames = Frames {
            broken: true,
            ..Default::default()
        };
        let sink: DuplexSink<Frames> = DuplexSink::new(frames);
        assert!(!sink.send_message("dropped").await);
        assert!(!sink.connect().await);
        assert!(!sink.send_message("late").await);
    }

    #[tokio::test]
    async fn test_disconnect_closes_sink() {
        let sink: DuplexSink<Frames> = DuplexSink::new(Frames::default());
        sink.disconnect().await;
        assert!(!sink.connect().await);
        assert!(sink.into_inner().is_none());
    }
}
