//! Write side of the connection.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::wire;
use crate::event::Event;

/// How long [`ChannelTransport`] waits on a full channel before giving up.
/// A healthy reader never hits this.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by a [`Transport`] write.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for serialized outbound events. Framing and encoding are the
/// implementor's business.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError>;
}

/// Transport that hands wire lines (without CRLF) to an `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
    timeout: Duration,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        let line = wire::serialize(event);
        match tokio::time::timeout(self.timeout, self.tx.send(line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(mpsc::error::SendError(_))) => Err(TransportError::Closed),
            Err(_elapsed) => {
                tracing::warn!(
                    "Outbound channel full: reader not draining (timeout after {:?})",
                    self.timeout
                );
                Err(TransportError::Timeout(self.timeout))
            }
        }
    }
}
