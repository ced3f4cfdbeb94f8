//! Event model.
//!
//! Every inbound line and every outbound request is an [`Event`]: an
//! immutable record carrying a connection-unique [`Sequence`], a timestamp,
//! a [`Direction`] and an [`EventKind`] payload. Events are created only
//! through an [`EventFactory`], which validates required fields before a
//! sequence number is spent.

mod factory;
mod kind;

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

pub use factory::{EventBuilder, EventFactory};
pub use kind::{CapEntry, CapSubCommand, EventKind, KindFamily, SaslReply};

use crate::ack::AckMatcher;
use crate::dispatch::{DispatchContext, Handler};
use crate::error::HandlerResult;

/// Connection-unique, strictly increasing event number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u64);

impl Sequence {
    /// Wrap a raw value. Only factories hand out fresh sequences.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which flow produced the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Decoded from the server.
    Inbound,
    /// Created locally for the wire.
    Outbound,
}

/// One protocol event.
///
/// Equality and hashing consider the sequence number only: two events are the
/// same event exactly when the factory handed them the same sequence.
#[derive(Clone, Debug)]
pub struct Event {
    seq: Sequence,
    timestamp: DateTime<Utc>,
    direction: Direction,
    source: Option<String>,
    raw: Option<String>,
    kind: EventKind,
}

impl Event {
    pub fn seq(&self) -> Sequence {
        self.seq
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    /// Origin prefix (`nick!user@host` or server name), inbound only.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Wire line this event was decoded from, if the decoder kept it.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Consume the event, keeping the payload.
    pub fn into_kind(self) -> EventKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn targets(&self) -> Option<&[String]> {
        self.kind.targets()
    }

    pub fn text(&self) -> Option<&str> {
        self.kind.text()
    }

    pub fn carries_text(&self) -> bool {
        self.kind.carries_text()
    }

    pub fn carries_channel(&self) -> bool {
        self.kind.carries_channel()
    }

    pub fn carries_multiple_targets(&self) -> bool {
        self.kind.carries_multiple_targets()
    }

    pub fn is_command(&self) -> bool {
        self.kind.is_command()
    }

    pub fn is_numeric_response(&self) -> bool {
        self.kind.is_numeric_response()
    }

    /// Acknowledgment predicate for this event, if it is an acknowledgeable
    /// outbound request.
    pub fn ack_matcher(&self) -> Option<AckMatcher> {
        AckMatcher::for_event(self)
    }

    /// Set the `more` flag of a `CAP LS`/`CAP LIST` fragment.
    ///
    /// Returns `false` (and changes nothing) for any other kind.
    pub fn mark_continued(&mut self, continued: bool) -> bool {
        match &mut self.kind {
            EventKind::Cap {
                sub: CapSubCommand::Ls | CapSubCommand::List,
                more,
                ..
            } => {
                *more = continued;
                true
            }
            _ => false,
        }
    }

    /// Visit `handler` with the overload matching this event's kind.
    pub fn accept(self, handler: &dyn Handler, ctx: &mut DispatchContext) -> HandlerResult {
        match self.kind.family() {
            KindFamily::Nick => handler.on_nick(self, ctx),
            KindFamily::Cap => handler.on_cap(self, ctx),
            KindFamily::Authenticate => handler.on_authenticate(self, ctx),
            KindFamily::Sasl => handler.on_sasl(self, ctx),
            KindFamily::Numeric => handler.on_numeric(self, ctx),
            KindFamily::Message => handler.on_message(self, ctx),
            KindFamily::Membership => handler.on_membership(self, ctx),
            KindFamily::Quit => handler.on_quit(self, ctx),
            KindFamily::Ping => handler.on_ping(self, ctx),
            KindFamily::Pong => handler.on_pong(self, ctx),
            KindFamily::Error => handler.on_error(self, ctx),
            KindFamily::Raw => handler.on_raw(self, ctx),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.seq, self.kind.name())
    }
}
