//! Handler trait and the per-walk context.

use std::collections::VecDeque;

use crate::ack::EmissionKey;
use crate::error::{HandlerError, HandlerResult};
use crate::event::{Event, EventFactory, EventKind};
use crate::outbound::{OutboundQueue, Priority};

/// What a handler does with the event it was given.
#[derive(Debug)]
pub enum Flow {
    /// Continue the walk with this event (the original or a substitute).
    Forward(Event),
    /// Stop the walk. Nothing reaches later handlers.
    Suppress,
}

/// Interceptor in a [`DispatchChain`](super::DispatchChain).
///
/// One overload per kind family. Every overload defaults to forwarding the
/// event unchanged, so a handler implements only what it cares about.
pub trait Handler: Send + Sync {
    /// Name used in fault reports and logs.
    fn name(&self) -> &'static str;

    /// Called once per connection, before any inbound event.
    fn on_connected(&self, _ctx: &mut DispatchContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called when the connection is lost. Per-connection state must reset.
    fn on_disconnected(&self) {}

    fn on_nick(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_cap(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_authenticate(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_sasl(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_numeric(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    /// PRIVMSG and NOTICE.
    fn on_message(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    /// JOIN and PART.
    fn on_membership(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_quit(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_ping(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_pong(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_error(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }

    fn on_raw(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        Ok(Flow::Forward(event))
    }
}

/// Context handed to every handler invocation.
pub struct DispatchContext<'a> {
    factory: &'a EventFactory,
    outbound: &'a OutboundQueue,
    side: &'a mut VecDeque<Event>,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(
        factory: &'a EventFactory,
        outbound: &'a OutboundQueue,
        side: &'a mut VecDeque<Event>,
    ) -> Self {
        Self {
            factory,
            outbound,
            side,
        }
    }

    /// Factory for derived events.
    pub fn factory(&self) -> &EventFactory {
        self.factory
    }

    pub fn outbound(&self) -> &OutboundQueue {
        self.outbound
    }

    /// Queue an event to be walked after the current walk finishes.
    pub fn side_dispatch(&mut self, event: Event) {
        self.side.push_back(event);
    }

    /// Build an outbound event and enqueue it.
    pub fn send(&self, kind: EventKind, priority: Priority) -> Result<EmissionKey, HandlerError> {
        let event = self.factory.outbound(kind).finish()?;
        Ok(self.outbound.enqueue(event, priority)?)
    }
}
