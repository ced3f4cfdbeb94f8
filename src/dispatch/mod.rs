//! Event dispatch pipeline.
//!
//! An inbound [`Event`](crate::Event) walks a [`DispatchChain`] of
//! [`Handler`]s in registration order. Each handler returns a [`Flow`]:
//!
//! - `Flow::Forward(event)` passes the same or a substituted event on.
//! - `Flow::Suppress` ends the walk silently.
//!
//! Handlers may also side-dispatch new events through the
//! [`DispatchContext`]. Those are walked only after the current walk
//! finishes, in the order they were queued.

mod chain;
mod fault;
mod handler;
mod translate;

pub use chain::{DispatchChain, DispatchChainBuilder, DispatchOutcome};
pub use fault::{FaultSink, TracingFaultSink};
pub use handler::{DispatchContext, Flow, Handler};
pub use translate::NumericTranslator;
