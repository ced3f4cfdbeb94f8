//! Ordered handler chain.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::fault::{FaultSink, TracingFaultSink};
use super::handler::{DispatchContext, Flow, Handler};
use crate::error::{DispatchError, FaultStage};
use crate::event::{Event, EventFactory, EventKind};
use crate::outbound::OutboundQueue;
use crate::telemetry::{WalkTimer, spans};

/// Result of dispatching one event, including everything it fanned out into.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Events that made it past the last handler, in walk order.
    pub delivered: Vec<Event>,
    /// Number of walks aborted by a handler failure.
    pub faulted: usize,
}

impl DispatchOutcome {
    fn absorb(&mut self, other: DispatchOutcome) {
        self.delivered.extend(other.delivered);
        self.faulted += other.faulted;
    }
}

/// Builder for [`DispatchChain`]. The chain is immutable once built.
#[derive(Default)]
pub struct DispatchChainBuilder {
    handlers: Vec<Arc<dyn Handler>>,
    fault_sink: Option<Arc<dyn FaultSink>>,
}

impl DispatchChainBuilder {
    /// Append a handler. Handlers run in the order they are added.
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a handler the caller keeps a reference to.
    pub fn shared(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Replace the default [`TracingFaultSink`].
    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    pub fn build(self, factory: Arc<EventFactory>, outbound: Arc<OutboundQueue>) -> DispatchChain {
        let counts = EventKind::NAMES
            .iter()
            .map(|&name| (name, AtomicU64::new(0)))
            .collect();
        DispatchChain {
            handlers: self.handlers,
            fault_sink: self
                .fault_sink
                .unwrap_or_else(|| Arc::new(TracingFaultSink)),
            factory,
            outbound,
            counts,
        }
    }
}

/// Ordered list of handlers with a shared fault sink.
pub struct DispatchChain {
    handlers: Vec<Arc<dyn Handler>>,
    fault_sink: Arc<dyn FaultSink>,
    factory: Arc<EventFactory>,
    outbound: Arc<OutboundQueue>,
    /// Walk counters per event kind
    counts: HashMap<&'static str, AtomicU64>,
}

impl DispatchChain {
    pub fn builder() -> DispatchChainBuilder {
        DispatchChainBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn factory(&self) -> &Arc<EventFactory> {
        &self.factory
    }

    pub fn outbound(&self) -> &Arc<OutboundQueue> {
        &self.outbound
    }

    /// Walk `event` through every handler, then walk whatever it
    /// side-dispatched. Returns once all of it has run to completion.
    pub fn dispatch(&self, event: Event) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let mut side = VecDeque::new();
            match self.walk(event, &mut side) {
                WalkEnd::Delivered(event) => outcome.delivered.push(event),
                WalkEnd::Suppressed => {}
                WalkEnd::Faulted => outcome.faulted += 1,
            }
            pending.extend(side);
        }

        outcome
    }

    /// Run every connect hook, then dispatch anything they side-dispatched.
    ///
    /// A failing hook is reported and does not stop the others.
    pub fn connected(&self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut side = VecDeque::new();

        for handler in &self.handlers {
            let mut ctx = DispatchContext::new(&self.factory, &self.outbound, &mut side);
            if let Err(source) = handler.on_connected(&mut ctx) {
                outcome.faulted += 1;
                self.fault_sink.report(&DispatchError {
                    handler: handler.name(),
                    stage: FaultStage::Connect,
                    source,
                });
            }
        }

        for event in side {
            outcome.absorb(self.dispatch(event));
        }
        outcome
    }

    pub fn disconnected(&self) {
        for handler in &self.handlers {
            handler.on_disconnected();
        }
    }

    /// Walk counts per event kind, busiest first. Unused kinds are omitted.
    pub fn event_stats(&self) -> Vec<(&'static str, u64)> {
        let mut stats: Vec<_> = self
            .counts
            .iter()
            .map(|(name, count)| (*name, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        stats
    }

    fn walk(&self, event: Event, side: &mut VecDeque<Event>) -> WalkEnd {
        let seq = event.seq();
        let kind = event.name();
        let span = spans::dispatch(seq, kind);
        let _enter = span.enter();
        let _timer = WalkTimer::new(kind);

        if let Some(count) = self.counts.get(kind) {
            count.fetch_add(1, Ordering::Relaxed);
        }

        let mut current = event;
        for handler in &self.handlers {
            let mut ctx = DispatchContext::new(&self.factory, &self.outbound, side);
            match current.accept(handler.as_ref(), &mut ctx) {
                Ok(Flow::Forward(next)) => current = next,
                Ok(Flow::Suppress) => {
                    trace!(handler = handler.name(), "Event suppressed");
                    return WalkEnd::Suppressed;
                }
                Err(source) => {
                    debug!(handler = handler.name(), error = %source, "Walk aborted");
                    self.fault_sink.report(&DispatchError {
                        handler: handler.name(),
                        stage: FaultStage::Event { seq, kind },
                        source,
                    });
                    return WalkEnd::Faulted;
                }
            }
        }
        WalkEnd::Delivered(current)
    }
}

enum WalkEnd {
    Delivered(Event),
    Suppressed,
    Faulted,
}
