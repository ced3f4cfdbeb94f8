//! Capability negotiation (`CAP LS/REQ/ACK/NAK/END`).
//!
//! The [`CapabilityNegotiator`] is a [`Handler`](crate::Handler) that drives
//! negotiation from the connect hook and inbound `CAP` events. Other
//! components add to the requested set through [`CapabilityContributor`]s,
//! which are polled once per connection.

mod negotiator;

pub use negotiator::{CapabilityNegotiator, NegotiationPhase, NegotiationState};

/// Supplies capability names to request on every connection.
pub trait CapabilityContributor: Send + Sync {
    fn capabilities(&self) -> Vec<String>;
}

impl<F> CapabilityContributor for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn capabilities(&self) -> Vec<String> {
        self()
    }
}
