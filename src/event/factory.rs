//! Event construction and sequence assignment.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::{CapSubCommand, Direction, Event, EventKind, Sequence};
use crate::error::InvalidEventError;

/// Connection-owned source of events.
///
/// Sequences start at 1 and are only spent by a successful
/// [`EventBuilder::finish`], so a rejected construction leaves no gap.
#[derive(Debug)]
pub struct EventFactory {
    next: AtomicU64,
}

impl Default for EventFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFactory {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Start an event decoded from the server.
    pub fn inbound(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, Direction::Inbound, kind)
    }

    /// Start an event the client will send.
    pub fn outbound(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, Direction::Outbound, kind)
    }

    /// The sequence the next successful construction will receive.
    pub fn peek(&self) -> Sequence {
        Sequence(self.next.load(Ordering::Relaxed))
    }

    fn allocate(&self) -> Sequence {
        Sequence(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pending event. Nothing is allocated until [`finish`](Self::finish).
#[must_use = "an event is only created by calling finish()"]
pub struct EventBuilder<'a> {
    factory: &'a EventFactory,
    direction: Direction,
    kind: EventKind,
    source: Option<String>,
    raw: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(factory: &'a EventFactory, direction: Direction, kind: EventKind) -> Self {
        Self {
            factory,
            direction,
            kind,
            source: None,
            raw: None,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Validate and stamp the event.
    pub fn finish(self) -> Result<Event, InvalidEventError> {
        validate(&self.kind)?;
        Ok(Event {
            seq: self.factory.allocate(),
            timestamp: Utc::now(),
            direction: self.direction,
            source: self.source,
            raw: self.raw,
            kind: self.kind,
        })
    }
}

fn validate(kind: &EventKind) -> Result<(), InvalidEventError> {
    let missing = |field: &'static str| Err(InvalidEventError::new(kind.name(), field));
    match kind {
        EventKind::Nick { nick } if nick.is_empty() => missing("nick"),
        EventKind::Privmsg { targets, .. } | EventKind::Notice { targets, .. }
            if targets.is_empty() || targets.iter().any(String::is_empty) =>
        {
            missing("target")
        }
        EventKind::Join { channel, .. } | EventKind::Part { channel, .. }
            if channel.is_empty() =>
        {
            missing("channel")
        }
        EventKind::Cap {
            sub: CapSubCommand::Req,
            caps,
            ..
        } if caps.is_empty() => missing("capability"),
        EventKind::Authenticate { payload } if payload.is_empty() => missing("payload"),
        EventKind::Numeric { code, .. } if !(1..=999).contains(code) => missing("code"),
        EventKind::Raw { command, .. } if command.is_empty() => missing("command"),
        EventKind::Ping { token } if token.is_empty() => missing("token"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_strictly_increasing() {
        let factory = EventFactory::new();
        let seqs: Vec<_> = (0..5)
            .map(|_| {
                factory
                    .outbound(EventKind::Pong { token: "t".into() })
                    .finish()
                    .unwrap()
                    .seq()
            })
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seqs[0], Sequence::from_raw(1));
    }

    #[test]
    fn rejected_construction_spends_no_sequence() {
        let factory = EventFactory::new();
        let err = factory
            .outbound(EventKind::Nick { nick: String::new() })
            .finish()
            .unwrap_err();
        assert_eq!(err, InvalidEventError::new("NICK", "nick"));
        assert_eq!(factory.peek(), Sequence::from_raw(1));
    }

    #[test]
    fn required_fields() {
        let factory = EventFactory::new();
        let rejects = [
            EventKind::Privmsg {
                targets: vec![],
                text: "hi".into(),
            },
            EventKind::Notice {
                targets: vec![String::new(), "bob".into()],
                text: "hi".into(),
            },
            EventKind::Privmsg {
                targets: vec!["#rust".into(), String::new()],
                text: "hi".into(),
            },
            EventKind::Join {
                channel: String::new(),
                key: None,
            },
            EventKind::Cap {
                sub: CapSubCommand::Req,
                caps: vec![],
                more: false,
                version: None,
            },
            EventKind::Authenticate {
                payload: String::new(),
            },
            EventKind::Numeric {
                code: 0,
                params: vec![],
            },
            EventKind::Raw {
                command: String::new(),
                params: vec![],
            },
        ];
        for kind in rejects {
            assert!(factory.inbound(kind).finish().is_err());
        }

        let end = factory
            .outbound(EventKind::Cap {
                sub: CapSubCommand::End,
                caps: vec![],
                more: false,
                version: None,
            })
            .finish();
        assert!(end.is_ok());
    }

    #[test]
    fn builder_keeps_source_and_raw() {
        let factory = EventFactory::new();
        let event = factory
            .inbound(EventKind::Nick { nick: "bob".into() })
            .source("alice!a@host")
            .raw(":alice!a@host NICK bob")
            .finish()
            .unwrap();
        assert_eq!(event.source(), Some("alice!a@host"));
        assert_eq!(event.raw(), Some(":alice!a@host NICK bob"));
        assert_eq!(event.direction(), Direction::Inbound);
    }
}
