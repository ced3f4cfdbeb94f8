//! Logging setup, walk timing and span helpers.

use std::time::Instant;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// A global subscriber could not be installed (usually: one already is).
#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Install a global `tracing` subscriber for the embedding application.
///
/// `RUST_LOG` overrides `config.filter` when set.
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| TelemetryError(e.to_string()))
}

/// Guard timing one dispatch walk.
///
/// Emits a `trace` record with the elapsed time when dropped.
pub struct WalkTimer {
    kind: &'static str,
    start: Instant,
}

impl WalkTimer {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for WalkTimer {
    fn drop(&mut self) {
        tracing::trace!(
            kind = self.kind,
            elapsed_us = self.start.elapsed().as_micros() as u64,
            "Walk finished"
        );
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Level, Span, span};

    use crate::event::Sequence;
    use crate::outbound::Priority;

    /// Span for one walk of the dispatch chain.
    pub fn dispatch(seq: Sequence, kind: &str) -> Span {
        span!(Level::DEBUG, "dispatch", seq = %seq, kind = %kind)
    }

    /// Span for one transport write.
    pub fn drain(seq: Sequence, kind: &str, priority: Priority) -> Span {
        span!(Level::DEBUG, "drain", seq = %seq, kind = %kind, priority = ?priority)
    }

    /// Span covering a whole connection epoch.
    pub fn session(epoch: u64) -> Span {
        span!(Level::INFO, "session", epoch)
    }
}
