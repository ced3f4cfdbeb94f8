//! Outbound request / inbound acknowledgment correlation.
//!
//! When the writer puts an acknowledgeable request on the wire it registers
//! an entry here first. Every inbound event is then offered to
//! [`AckRegistry::resolve`], which removes the oldest entry whose
//! [`AckMatcher`] accepts the event.
//!
//! Registration happens before the transport write is issued, so a reply can
//! never arrive for a request the registry does not know about yet. The
//! writer registers while it still holds the queue lock, so a request is
//! always either queued or registered; see
//! [`OutboundQueue::on_acknowledged`](crate::OutboundQueue::on_acknowledged).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::casemap::irc_eq;
use crate::event::{CapSubCommand, Direction, Event, EventKind, SaslReply, Sequence};

/// Nick change failures that acknowledge a pending `NICK` request.
///
/// 432 ERR_ERRONEUSNICKNAME, 433 ERR_NICKNAMEINUSE, 436 ERR_NICKCOLLISION,
/// 437 ERR_UNAVAILRESOURCE, 438 ERR_NICKTOOFAST, 902 ERR_NICKLOCKED.
pub const NICK_FAILURE_NUMERICS: [u16; 6] = [432, 433, 436, 437, 438, 902];

/// Handle returned by [`OutboundQueue::enqueue`](crate::OutboundQueue::enqueue).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmissionKey(u64);

impl EmissionKey {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emission-{}", self.0)
    }
}

/// Acknowledgment predicate derived from an outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AckMatcher {
    /// `NICK new`: confirmed by the server echoing the change, or refused by
    /// one of [`NICK_FAILURE_NUMERICS`].
    Nick { nick: String },
    /// `CAP REQ`: answered by `CAP ACK` or `CAP NAK` naming the same set.
    CapRequest { caps: BTreeSet<String> },
    /// `PING token`: answered by `PONG token`.
    Ping { token: String },
}

impl AckMatcher {
    /// Matcher for an outbound event, or `None` if nothing acknowledges it.
    pub fn for_event(event: &Event) -> Option<Self> {
        if event.direction() != Direction::Outbound {
            return None;
        }
        match event.kind() {
            EventKind::Nick { nick } => Some(Self::Nick { nick: nick.clone() }),
            EventKind::Cap {
                sub: CapSubCommand::Req,
                caps,
                ..
            } => Some(Self::CapRequest {
                caps: caps.iter().map(|c| c.token()).collect(),
            }),
            EventKind::Ping { token } => Some(Self::Ping {
                token: token.clone(),
            }),
            _ => None,
        }
    }

    /// Whether `inbound` acknowledges the request. Anything not listed for a
    /// matcher is "no match".
    pub fn is_acknowledged_by(&self, inbound: &Event) -> bool {
        if inbound.direction() != Direction::Inbound {
            return false;
        }
        match (self, inbound.kind()) {
            (Self::Nick { nick }, EventKind::Nick { nick: changed }) => irc_eq(nick, changed),
            (Self::Nick { .. }, EventKind::Numeric { code, .. }) => {
                NICK_FAILURE_NUMERICS.contains(code)
            }
            (
                Self::Nick { .. },
                EventKind::Sasl {
                    reply: SaslReply::NickLocked,
                    ..
                },
            ) => true,
            (
                Self::CapRequest { caps },
                EventKind::Cap {
                    sub: CapSubCommand::Ack | CapSubCommand::Nak,
                    caps: answered,
                    ..
                },
            ) => {
                let answered: BTreeSet<String> = answered.iter().map(|c| c.token()).collect();
                *caps == answered
            }
            (Self::Ping { token }, EventKind::Pong { token: echoed }) => token == echoed,
            _ => false,
        }
    }
}

/// A request matched to the reply that acknowledged it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgement {
    pub key: EmissionKey,
    /// Sequence of the outbound request.
    pub request: Sequence,
    /// Sequence of the inbound reply.
    pub reply: Sequence,
}

/// Completion callback run once when a request is acknowledged.
pub type AckCallback = Box<dyn FnOnce(&Acknowledgement) + Send>;

struct Entry {
    key: EmissionKey,
    request: Sequence,
    matcher: AckMatcher,
}

#[derive(Default)]
struct Inner {
    /// Oldest registration first
    entries: VecDeque<Entry>,
    callbacks: HashMap<EmissionKey, AckCallback>,
}

/// Outstanding acknowledgeable requests for one connection.
#[derive(Default)]
pub struct AckRegistry {
    inner: Mutex<Inner>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `event` under `key` if it is acknowledgeable.
    ///
    /// Returns `false` when the event has no matcher or the key is already
    /// outstanding.
    pub fn register(&self, key: EmissionKey, event: &Event) -> bool {
        self.register_with(key, event, None)
    }

    /// [`register`](Self::register), attaching `callback` in the same step.
    /// The callback is dropped if registration is refused.
    pub fn register_with(
        &self,
        key: EmissionKey,
        event: &Event,
        callback: Option<AckCallback>,
    ) -> bool {
        let Some(matcher) = AckMatcher::for_event(event) else {
            return false;
        };
        let mut inner = self.inner.lock();
        if inner.entries.iter().any(|e| e.key == key) {
            return false;
        }
        trace!(%key, seq = %event.seq(), kind = event.name(), "Awaiting acknowledgment");
        inner.entries.push_back(Entry {
            key,
            request: event.seq(),
            matcher,
        });
        if let Some(callback) = callback {
            inner.callbacks.insert(key, callback);
        }
        true
    }

    /// Drop the entry for `key` (e.g. the write failed). Its callback is
    /// dropped unfired.
    pub fn withdraw(&self, key: EmissionKey) -> bool {
        let mut inner = self.inner.lock();
        inner.callbacks.remove(&key);
        let before = inner.entries.len();
        inner.entries.retain(|e| e.key != key);
        before != inner.entries.len()
    }

    /// Match `inbound` against outstanding entries, oldest first.
    ///
    /// At most one entry is resolved per inbound event. The completion
    /// callback, if any, runs after the registry lock is released.
    pub fn resolve(&self, inbound: &Event) -> Option<Acknowledgement> {
        if inbound.is_outbound() {
            return None;
        }
        let (ack, callback) = {
            let mut inner = self.inner.lock();
            let index = inner
                .entries
                .iter()
                .position(|e| e.matcher.is_acknowledged_by(inbound))?;
            let entry = inner.entries.remove(index)?;
            let callback = inner.callbacks.remove(&entry.key);
            let ack = Acknowledgement {
                key: entry.key,
                request: entry.request,
                reply: inbound.seq(),
            };
            (ack, callback)
        };

        debug!(
            key = %ack.key,
            request = %ack.request,
            reply = %ack.reply,
            "Request acknowledged"
        );
        if let Some(callback) = callback {
            callback(&ack);
        }
        Some(ack)
    }

    /// Run `callback` when the registered request `key` is acknowledged.
    ///
    /// Returns `false` (dropping the callback) if nothing is outstanding
    /// under `key`, which includes requests still waiting in the queue; use
    /// [`Session::on_acknowledged`](crate::Session::on_acknowledged) for
    /// those. A callback never runs if the entry is withdrawn or the registry
    /// is cleared.
    pub fn on_acknowledged<F>(&self, key: EmissionKey, callback: F) -> bool
    where
        F: FnOnce(&Acknowledgement) + Send + 'static,
    {
        self.attach(key, Box::new(callback))
    }

    pub(crate) fn attach(&self, key: EmissionKey, callback: AckCallback) -> bool {
        let mut inner = self.inner.lock();
        if !inner.entries.iter().any(|e| e.key == key) {
            return false;
        }
        inner.callbacks.insert(key, callback);
        true
    }

    pub fn is_outstanding(&self, key: EmissionKey) -> bool {
        self.inner.lock().entries.iter().any(|e| e.key == key)
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Drop every entry and callback without firing them. Used on disconnect,
    /// where outcomes are indeterminate rather than failed.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.callbacks.clear();
        if dropped > 0 {
            debug!(dropped, "Acknowledgment registry cleared");
        }
    }
}

impl fmt::Debug for AckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckRegistry")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
