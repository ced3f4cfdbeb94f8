//! Unified error handling for slirc-client.
//!
//! Each layer of the engine has its own typed error. [`EngineError`] collects
//! them for callers that drive a [`Session`](crate::Session) end to end.

use std::fmt;

use thiserror::Error;

use crate::codec::Base64Error;
use crate::config::ConfigError;
use crate::event::Sequence;
use crate::outbound::TransportError;
use crate::sasl::MechanismError;

// ============================================================================
// Construction Errors (event model)
// ============================================================================

/// An event kind was built without one of its required fields.
///
/// Construction either yields a complete [`Event`](crate::Event) or this
/// error; a partially built event is never observable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} event: {field} is required")]
pub struct InvalidEventError {
    /// Kind name (e.g. `NICK`).
    pub kind: &'static str,
    /// The missing or empty field.
    pub field: &'static str,
}

impl InvalidEventError {
    pub(crate) const fn new(kind: &'static str, field: &'static str) -> Self {
        Self { kind, field }
    }
}

// ============================================================================
// Queue Errors
// ============================================================================

/// The outbound queue was permanently closed before the event was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outbound queue is closed")]
pub struct QueueClosedError;

// ============================================================================
// Handler Errors (dispatch)
// ============================================================================

/// Errors a [`Handler`](crate::Handler) may raise during its walk.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("could not build derived event: {0}")]
    InvalidEvent(#[from] InvalidEventError),

    #[error("could not enqueue request: {0}")]
    Queue(#[from] QueueClosedError),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEvent(_) => "invalid_event",
            Self::Queue(_) => "queue_closed",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type for handler overloads.
pub type HandlerResult = Result<crate::dispatch::Flow, HandlerError>;

/// Where in the chain a handler fault happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    /// While walking a specific event.
    Event {
        /// Sequence of the event being walked.
        seq: Sequence,
        /// Kind name of the event being walked.
        kind: &'static str,
    },
    /// While running connect hooks.
    Connect,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { seq, kind } => write!(f, "{kind} event #{seq}"),
            Self::Connect => f.write_str("connect hook"),
        }
    }
}

/// A handler failed. The failure is confined to one walk.
#[derive(Debug, Error)]
#[error("handler `{handler}` failed during {stage}")]
pub struct DispatchError {
    /// Name of the failing handler.
    pub handler: &'static str,
    /// What the chain was doing.
    pub stage: FaultStage,
    /// Underlying handler error.
    #[source]
    pub source: HandlerError,
}

// ============================================================================
// Engine Errors (top level)
// ============================================================================

/// Aggregate error for callers driving a whole session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidEvent(#[from] InvalidEventError),

    #[error(transparent)]
    QueueClosed(#[from] QueueClosedError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] Base64Error),

    #[error(transparent)]
    Mechanism(#[from] MechanismError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
