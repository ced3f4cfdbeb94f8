//! Outbound request scheduling.
//!
//! Any origin (handlers, timers, the embedding application) may
//! [`enqueue`](OutboundQueue::enqueue) concurrently. A single
//! [`OutboundWriter`] drains the queue by priority class, then by enqueue
//! order, handing each event to a [`Transport`].
//!
//! Every [`discard`](OutboundQueue::discard) starts a new generation. An item
//! popped before a discard carries the old generation and the writer drops it
//! instead of writing it to whatever connection comes next.

mod transport;
pub mod wire;
mod writer;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

pub use transport::{ChannelTransport, SEND_TIMEOUT, Transport, TransportError};
pub use writer::OutboundWriter;

use crate::ack::{AckCallback, AckMatcher, AckRegistry, EmissionKey};
use crate::error::QueueClosedError;
use crate::event::Event;

/// Scheduling class. `High` drains before `Normal`, `Normal` before `Low`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Negotiation and hang-up traffic.
    High,
    #[default]
    Normal,
    Low,
}

/// An event waiting for the writer.
#[derive(Debug)]
pub struct PendingOutbound {
    pub sequence: u64,
    pub key: EmissionKey,
    pub event: Event,
    pub priority: Priority,
    pub enqueued_at: Instant,
    /// Queue generation at enqueue time.
    pub generation: u64,
}

impl PartialEq for PendingOutbound {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for PendingOutbound {}

impl Ord for PendingOutbound {
    /// Max-heap order: the "greatest" item is the one to send next.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingOutbound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<PendingOutbound>,
    next: u64,
    generation: u64,
    closed: bool,
    /// Completion callbacks for items still in `heap`.
    callbacks: HashMap<EmissionKey, AckCallback>,
}

impl QueueState {
    fn pop(&mut self, acks: Option<&AckRegistry>) -> Option<PendingOutbound> {
        let item = self.heap.pop()?;
        let callback = self.callbacks.remove(&item.key);
        if let Some(acks) = acks {
            acks.register_with(item.key, &item.event, callback);
        }
        Some(item)
    }
}

impl std::fmt::Debug for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueState")
            .field("pending", &self.heap.len())
            .field("next", &self.next)
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Priority queue of outbound events.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    ready: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event`. Never blocks.
    pub fn enqueue(&self, event: Event, priority: Priority) -> Result<EmissionKey, QueueClosedError> {
        let key = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueClosedError);
            }
            state.next += 1;
            let sequence = state.next;
            let key = EmissionKey::new(sequence);
            trace!(%key, seq = %event.seq(), kind = event.name(), ?priority, "Enqueued");
            let generation = state.generation;
            state.heap.push(PendingOutbound {
                sequence,
                key,
                event,
                priority,
                enqueued_at: Instant::now(),
                generation,
            });
            key
        };
        self.ready.notify_one();
        Ok(key)
    }

    /// Next item in drain order, if any. Callbacks attached to it are
    /// dropped.
    pub fn try_next(&self) -> Option<PendingOutbound> {
        self.state.lock().pop(None)
    }

    /// Like [`try_next`](Self::try_next), but registers the item with `acks`
    /// (with any attached callback) before the queue lock is released.
    pub fn try_next_registered(&self, acks: &AckRegistry) -> Option<PendingOutbound> {
        self.state.lock().pop(Some(acks))
    }

    /// Wait for the next item. Returns `None` once the queue is closed and
    /// empty.
    pub async fn next(&self) -> Option<PendingOutbound> {
        self.wait_next(None).await
    }

    /// Wait for the next item and register it with `acks` under the queue
    /// lock, as [`try_next_registered`](Self::try_next_registered) does.
    pub async fn next_registered(&self, acks: &AckRegistry) -> Option<PendingOutbound> {
        self.wait_next(Some(acks)).await
    }

    async fn wait_next(&self, acks: Option<&AckRegistry>) -> Option<PendingOutbound> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(item) = state.pop(acks) {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.ready.notified().await;
        }
    }

    /// Run `callback` when the request under `key` is acknowledged.
    ///
    /// Works whether the request is still queued or already written: a
    /// queued request carries the callback into `acks` when it drains. Returns
    /// `false` (dropping the callback) if the request is not acknowledgeable
    /// or has already settled.
    pub fn on_acknowledged(&self, acks: &AckRegistry, key: EmissionKey, callback: AckCallback) -> bool {
        let mut state = self.state.lock();
        let queued = state
            .heap
            .iter()
            .find(|item| item.key == key)
            .map(|item| AckMatcher::for_event(&item.event).is_some());
        match queued {
            Some(true) => {
                state.callbacks.insert(key, callback);
                true
            }
            Some(false) => false,
            None => acks.attach(key, callback),
        }
    }

    /// Drop everything pending, with any callbacks attached to it, and start
    /// a new generation. The queue stays open.
    pub fn discard(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.heap.len();
        state.heap.clear();
        state.callbacks.clear();
        state.generation += 1;
        if dropped > 0 {
            debug!(dropped, generation = state.generation, "Outbound queue discarded");
        }
        dropped
    }

    /// Current generation. Bumped by every [`discard`](Self::discard).
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Close permanently. Pending items still drain; new ones are refused.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }
}
