//! Client side capability negotiation state machine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::CapabilityContributor;
use crate::config::CapabilityConfig;
use crate::dispatch::{DispatchContext, Flow, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::event::{CapEntry, CapSubCommand, Event, EventKind};
use crate::outbound::Priority;

/// Where negotiation stands for the current connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NegotiationPhase {
    /// Not connected, or `CAP LS` not sent yet.
    #[default]
    Idle,
    /// `CAP LS` sent, collecting fragments.
    Listing,
    /// `CAP REQ` outstanding.
    Requesting,
    /// Every requested capability acknowledged (or nothing to request).
    Negotiated,
    /// The last request was refused.
    Denied,
}

/// Per-connection negotiation state. Reset on every disconnect.
#[derive(Clone, Debug, Default)]
pub struct NegotiationState {
    pub phase: NegotiationPhase,
    /// Configured plus contributed capabilities, minus refused ones.
    pub desired: BTreeSet<String>,
    /// Capabilities in the outstanding `CAP REQ`.
    pub requested: BTreeSet<String>,
    pub acknowledged: BTreeSet<String>,
    pub denied: BTreeSet<String>,
    /// Advertised capabilities and their `CAP LS 302` values.
    pub advertised: BTreeMap<String, Option<String>>,
    /// A listing fragment arrived and its terminal fragment has not.
    pub more_pending: bool,
    pub version: u16,
    pub end_sent: bool,
}

/// Drives `CAP` negotiation for one connection.
pub struct CapabilityNegotiator {
    config: CapabilityConfig,
    contributors: Mutex<Vec<Arc<dyn CapabilityContributor>>>,
    state: Mutex<NegotiationState>,
}

impl CapabilityNegotiator {
    pub fn new(config: CapabilityConfig) -> Self {
        let state = NegotiationState {
            version: config.version,
            ..NegotiationState::default()
        };
        Self {
            config,
            contributors: Mutex::new(Vec::new()),
            state: Mutex::new(state),
        }
    }

    /// Add a contributor. It is polled on the next connect.
    pub fn register_contributor(&self, contributor: Arc<dyn CapabilityContributor>) {
        self.contributors.lock().push(contributor);
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.state.lock().phase
    }

    /// Snapshot of the whole state.
    pub fn state(&self) -> NegotiationState {
        self.state.lock().clone()
    }

    pub fn is_enabled(&self, cap: &str) -> bool {
        self.state.lock().acknowledged.contains(cap)
    }

    pub fn is_advertised(&self, cap: &str) -> bool {
        self.state.lock().advertised.contains_key(cap)
    }

    /// Value the server advertised for `cap` (e.g. `PLAIN,EXTERNAL` for
    /// `sasl`).
    pub fn advertised_value(&self, cap: &str) -> Option<String> {
        self.state.lock().advertised.get(cap).cloned().flatten()
    }

    pub fn acknowledged(&self) -> BTreeSet<String> {
        self.state.lock().acknowledged.clone()
    }

    fn reset(&self) {
        *self.state.lock() = NegotiationState {
            version: self.config.version,
            ..NegotiationState::default()
        };
    }

    fn request(
        state: &mut NegotiationState,
        caps: BTreeSet<String>,
        ctx: &DispatchContext<'_>,
    ) -> Result<(), HandlerError> {
        debug!(caps = ?caps, "Requesting capabilities");
        ctx.send(
            EventKind::Cap {
                sub: CapSubCommand::Req,
                caps: caps.iter().map(CapEntry::new).collect(),
                more: false,
                version: None,
            },
            Priority::High,
        )?;
        state.requested = caps;
        state.phase = NegotiationPhase::Requesting;
        Ok(())
    }

    fn end(state: &mut NegotiationState, ctx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        if state.end_sent {
            return Ok(());
        }
        ctx.send(
            EventKind::Cap {
                sub: CapSubCommand::End,
                caps: Vec::new(),
                more: false,
                version: None,
            },
            Priority::High,
        )?;
        state.end_sent = true;
        info!(enabled = ?state.acknowledged, "Capability negotiation finished");
        Ok(())
    }

    /// Desired capabilities the server offers that are not enabled, refused
    /// or already requested.
    fn wanted(state: &NegotiationState) -> BTreeSet<String> {
        state
            .desired
            .iter()
            .filter(|cap| state.advertised.contains_key(*cap))
            .filter(|cap| !state.acknowledged.contains(*cap) && !state.denied.contains(*cap))
            .cloned()
            .collect()
    }

    fn on_listing(
        state: &mut NegotiationState,
        caps: &[CapEntry],
        more: bool,
        ctx: &DispatchContext<'_>,
    ) -> Result<(), HandlerError> {
        for entry in caps {
            state
                .advertised
                .insert(entry.name.clone(), entry.value.clone());
        }
        state.more_pending = more;
        if more || state.phase != NegotiationPhase::Listing {
            return Ok(());
        }

        let wanted = Self::wanted(state);
        if wanted.is_empty() {
            state.phase = NegotiationPhase::Negotiated;
            Self::end(state, ctx)
        } else {
            Self::request(state, wanted, ctx)
        }
    }

    fn on_ack(
        state: &mut NegotiationState,
        caps: &[CapEntry],
        ctx: &DispatchContext<'_>,
    ) -> Result<(), HandlerError> {
        for entry in caps {
            if entry.disabled {
                state.acknowledged.remove(&entry.name);
            } else {
                state.acknowledged.insert(entry.name.clone());
            }
        }
        if state.phase == NegotiationPhase::Requesting
            && state.requested.is_subset(&state.acknowledged)
        {
            state.requested.clear();
            state.phase = NegotiationPhase::Negotiated;
            Self::end(state, ctx)?;
        }
        Ok(())
    }

    fn on_nak(
        state: &mut NegotiationState,
        caps: &[CapEntry],
        ctx: &DispatchContext<'_>,
    ) -> Result<(), HandlerError> {
        warn!(caps = ?caps.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), "Capability request refused");
        for entry in caps {
            state.desired.remove(&entry.name);
            state.requested.remove(&entry.name);
            state.denied.insert(entry.name.clone());
        }
        state.phase = NegotiationPhase::Denied;

        let reduced = Self::wanted(state);
        if reduced.is_empty() {
            state.requested.clear();
            Self::end(state, ctx)
        } else {
            Self::request(state, reduced, ctx)
        }
    }

    fn on_new(
        state: &mut NegotiationState,
        caps: &[CapEntry],
        ctx: &DispatchContext<'_>,
    ) -> Result<(), HandlerError> {
        for entry in caps {
            state
                .advertised
                .insert(entry.name.clone(), entry.value.clone());
        }
        if state.phase == NegotiationPhase::Listing || state.phase == NegotiationPhase::Requesting {
            return Ok(());
        }
        let wanted = Self::wanted(state);
        if wanted.is_empty() {
            return Ok(());
        }
        Self::request(state, wanted, ctx)
    }

    fn on_del(state: &mut NegotiationState, caps: &[CapEntry]) {
        for entry in caps {
            state.advertised.remove(&entry.name);
            if state.acknowledged.remove(&entry.name) {
                debug!(cap = %entry.name, "Capability withdrawn by server");
            }
        }
    }
}

impl Handler for CapabilityNegotiator {
    fn name(&self) -> &'static str {
        "capabilities"
    }

    fn on_connected(&self, ctx: &mut DispatchContext<'_>) -> Result<(), HandlerError> {
        let mut desired: BTreeSet<String> = self.config.request.iter().cloned().collect();
        for contributor in self.contributors.lock().iter() {
            desired.extend(contributor.capabilities());
        }

        let mut state = self.state.lock();
        *state = NegotiationState {
            version: self.config.version,
            desired,
            ..NegotiationState::default()
        };
        ctx.send(
            EventKind::Cap {
                sub: CapSubCommand::Ls,
                caps: Vec::new(),
                more: false,
                version: Some(state.version),
            },
            Priority::High,
        )?;
        state.phase = NegotiationPhase::Listing;
        debug!(desired = ?state.desired, version = state.version, "Capability listing requested");
        Ok(())
    }

    fn on_disconnected(&self) {
        self.reset();
    }

    fn on_cap(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if event.is_outbound() {
            return Ok(Flow::Forward(event));
        }
        if let EventKind::Cap {
            sub, caps, more, ..
        } = event.kind()
        {
            let mut state = self.state.lock();
            match sub {
                CapSubCommand::Ls => Self::on_listing(&mut state, caps, *more, ctx)?,
                CapSubCommand::Ack => Self::on_ack(&mut state, caps, ctx)?,
                CapSubCommand::Nak => Self::on_nak(&mut state, caps, ctx)?,
                CapSubCommand::New => Self::on_new(&mut state, caps, ctx)?,
                CapSubCommand::Del => Self::on_del(&mut state, caps),
                CapSubCommand::List | CapSubCommand::Req | CapSubCommand::End => {}
            }
        }
        Ok(Flow::Forward(event))
    }
}
