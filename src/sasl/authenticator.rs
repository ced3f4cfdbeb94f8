//! `AUTHENTICATE` state machine.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::chunk::{ChallengeBuffer, chunk_response};
use super::mechanism::{Mechanism, MechanismError, MechanismProvider};
use super::{AuthState, CredentialSource, Credentials, MechanismKind};
use crate::caps::CapabilityContributor;
use crate::codec::{Base64Error, base64};
use crate::config::SaslConfig;
use crate::dispatch::{DispatchContext, Flow, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::event::{CapEntry, CapSubCommand, Event, EventKind, SaslReply};
use crate::outbound::Priority;

const SASL_CAP: &str = "sasl";

/// A mechanism still to be tried, with the credentials it will use.
struct Candidate {
    provider: Arc<dyn MechanismProvider>,
    credentials: Credentials,
}

/// Per-connection exchange state.
#[derive(Default)]
struct Exchange {
    state: AuthState,
    candidates: VecDeque<Candidate>,
    current: Option<Box<dyn Mechanism>>,
    /// The `CAP ACK` held back until authentication ends.
    deferred_ack: Option<Event>,
    challenge: ChallengeBuffer,
    /// Mechanisms the server offers, from `sasl=` or 908.
    server_mechanisms: Option<Vec<String>>,
    account: Option<String>,
}

impl Exchange {
    fn drop_current(&mut self) {
        if let Some(mut mechanism) = self.current.take() {
            mechanism.dispose();
        }
        self.challenge.clear();
    }

    fn reset(&mut self) {
        self.drop_current();
        *self = Exchange::default();
    }
}

enum Failure {
    Decode(Base64Error),
    Mechanism(MechanismError),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "undecodable challenge: {e}"),
            Self::Mechanism(e) => write!(f, "{e}"),
        }
    }
}

/// Authenticates the connection once the server acknowledges `sasl`.
pub struct SaslAuthenticator {
    config: SaslConfig,
    providers: Vec<Arc<dyn MechanismProvider>>,
    credentials: Arc<dyn CredentialSource>,
    exchange: Mutex<Exchange>,
}

impl SaslAuthenticator {
    /// Build an authenticator trying the configured built-in mechanisms in
    /// order. Unknown names are skipped.
    pub fn new(config: SaslConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let providers = config
            .mechanisms
            .iter()
            .filter_map(|name| MechanismKind::from_name(name))
            .map(|kind| Arc::new(kind) as Arc<dyn MechanismProvider>)
            .collect();
        Self {
            config,
            providers,
            credentials,
            exchange: Mutex::new(Exchange::default()),
        }
    }

    /// Append a mechanism, tried after the configured ones.
    pub fn with_provider(mut self, provider: Arc<dyn MechanismProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn state(&self) -> AuthState {
        self.exchange.lock().state
    }

    /// Account reported by 900, cleared by 901.
    pub fn account(&self) -> Option<String> {
        self.exchange.lock().account.clone()
    }

    /// Mechanisms the server said it supports, if it said.
    pub fn server_mechanisms(&self) -> Option<Vec<String>> {
        self.exchange.lock().server_mechanisms.clone()
    }

    /// Abandon any running exchange and return to [`AuthState::Query`].
    pub fn hang_up(&self) {
        self.exchange.lock().reset();
    }

    fn server_offers(server: Option<&[String]>, name: &str) -> bool {
        server.is_none_or(|list| list.iter().any(|m| m.eq_ignore_ascii_case(name)))
    }

    fn gather(&self, exchange: &mut Exchange) {
        let server = exchange.server_mechanisms.as_deref();
        exchange.candidates = self
            .providers
            .iter()
            .filter(|provider| Self::server_offers(server, provider.name()))
            .filter_map(|provider| {
                self.credentials
                    .lookup(provider.name())
                    .map(|credentials| Candidate {
                        provider: provider.clone(),
                        credentials,
                    })
            })
            .collect();
        debug!(
            candidates = ?exchange.candidates.iter().map(|c| c.provider.name()).collect::<Vec<_>>(),
            "SASL candidates gathered"
        );
    }

    /// Start the next candidate, or hang up when none is left.
    fn advance(&self, exchange: &mut Exchange, ctx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        exchange.drop_current();

        while let Some(candidate) = exchange.candidates.pop_front() {
            let mut mechanism = candidate.provider.create(candidate.credentials);
            if let Err(e) = mechanism.begin() {
                warn!(mechanism = mechanism.name(), error = %e, "Mechanism refused to start");
                mechanism.dispose();
                continue;
            }
            ctx.send(
                EventKind::Authenticate {
                    payload: mechanism.name().to_string(),
                },
                Priority::High,
            )?;
            debug!(mechanism = mechanism.name(), "SASL mechanism started");
            exchange.current = Some(mechanism);
            exchange.state = AuthState::Requested;
            return Ok(());
        }

        self.exhausted(exchange, ctx)
    }

    fn exhausted(&self, exchange: &mut Exchange, ctx: &DispatchContext<'_>) -> Result<(), HandlerError> {
        warn!("No SASL mechanism succeeded, hanging up");
        exchange.state = AuthState::Unavailable;
        exchange.deferred_ack = None;
        ctx.send(
            EventKind::Quit {
                reason: Some(self.config.hangup_message.clone()),
            },
            Priority::High,
        )?;
        Ok(())
    }

    fn respond(
        &self,
        exchange: &mut Exchange,
        encoded: &str,
        ctx: &DispatchContext<'_>,
    ) -> Result<Result<(), Failure>, HandlerError> {
        let challenge = match base64::decode(encoded) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) => return Ok(Err(Failure::Decode(e))),
        };
        let Some(mechanism) = exchange.current.as_mut() else {
            return Ok(Ok(()));
        };
        let response = match mechanism.evaluate_challenge(&challenge) {
            Ok(response) => response,
            Err(e) => return Ok(Err(Failure::Mechanism(e))),
        };

        let encoded = Zeroizing::new(base64::encode(&response));
        for chunk in chunk_response(&encoded) {
            ctx.send(EventKind::Authenticate { payload: chunk }, Priority::High)?;
        }
        Ok(Ok(()))
    }

    fn on_ack(&self, exchange: &mut Exchange, event: Event, ctx: &DispatchContext<'_>) -> HandlerResult {
        let acks_sasl = matches!(
            event.kind(),
            EventKind::Cap { caps, .. } if caps.iter().any(|c| c.name == SASL_CAP && !c.disabled)
        );
        if !acks_sasl || exchange.state != AuthState::Query {
            return Ok(Flow::Forward(event));
        }

        info!(seq = %event.seq(), "sasl acknowledged, authenticating");
        exchange.deferred_ack = Some(event);
        self.gather(exchange);
        self.advance(exchange, ctx)?;
        Ok(Flow::Suppress)
    }

    fn record_listing(exchange: &mut Exchange, caps: &[CapEntry]) {
        if let Some(entry) = caps.iter().find(|c| c.name == SASL_CAP) {
            if let Some(value) = &entry.value {
                exchange.server_mechanisms = Some(
                    value
                        .split(',')
                        .filter(|m| !m.is_empty())
                        .map(str::to_owned)
                        .collect(),
                );
            }
        }
    }
}

impl CapabilityContributor for SaslAuthenticator {
    fn capabilities(&self) -> Vec<String> {
        let usable = self.config.enabled
            && self
                .providers
                .iter()
                .any(|provider| self.credentials.lookup(provider.name()).is_some());
        if usable {
            vec![SASL_CAP.to_string()]
        } else {
            Vec::new()
        }
    }
}

impl Handler for SaslAuthenticator {
    fn name(&self) -> &'static str {
        "sasl"
    }

    fn on_connected(&self, _ctx: &mut DispatchContext<'_>) -> Result<(), HandlerError> {
        self.exchange.lock().reset();
        Ok(())
    }

    fn on_disconnected(&self) {
        self.exchange.lock().reset();
    }

    fn on_cap(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if event.is_outbound() {
            return Ok(Flow::Forward(event));
        }
        let mut exchange = self.exchange.lock();
        match event.kind() {
            EventKind::Cap {
                sub: CapSubCommand::Ls | CapSubCommand::New,
                caps,
                ..
            } => {
                Self::record_listing(&mut exchange, caps);
                Ok(Flow::Forward(event))
            }
            EventKind::Cap {
                sub: CapSubCommand::Ack,
                ..
            } => self.on_ack(&mut exchange, event, ctx),
            _ => Ok(Flow::Forward(event)),
        }
    }

    fn on_authenticate(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if event.is_outbound() {
            return Ok(Flow::Forward(event));
        }
        let mut exchange = self.exchange.lock();
        if exchange.state != AuthState::Requested || exchange.current.is_none() {
            return Ok(Flow::Forward(event));
        }
        let EventKind::Authenticate { payload } = event.kind() else {
            return Ok(Flow::Forward(event));
        };

        let outcome = match exchange.challenge.push(payload) {
            Ok(None) => return Ok(Flow::Forward(event)),
            Ok(Some(encoded)) => self.respond(&mut exchange, &encoded, ctx)?,
            Err(e) => Err(Failure::Mechanism(e)),
        };

        if let Err(failure) = outcome {
            warn!(seq = %event.seq(), error = %failure, "SASL exchange failed locally, aborting");
            ctx.send(
                EventKind::Authenticate {
                    payload: "*".to_string(),
                },
                Priority::High,
            )?;
            self.advance(&mut exchange, ctx)?;
        }
        Ok(Flow::Forward(event))
    }

    fn on_sasl(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if event.is_outbound() {
            return Ok(Flow::Forward(event));
        }
        let EventKind::Sasl { reply, .. } = event.kind() else {
            return Ok(Flow::Forward(event));
        };
        let mut exchange = self.exchange.lock();

        match reply {
            SaslReply::Success | SaslReply::AlreadyAuthenticated
                if exchange.state == AuthState::Requested
                    && exchange.current.as_ref().is_some_and(|m| !m.is_complete()) =>
            {
                // e.g. 903 with no SCRAM server-final: the server is unverified.
                warn!(
                    code = reply.code(),
                    mechanism = exchange.current.as_ref().map(|m| m.name()),
                    "SASL success before the mechanism completed, rejecting"
                );
                self.advance(&mut exchange, ctx)?;
            }
            SaslReply::Success | SaslReply::AlreadyAuthenticated
                if exchange.state == AuthState::Requested =>
            {
                info!(code = reply.code(), account = ?exchange.account, "SASL authentication succeeded");
                exchange.drop_current();
                exchange.candidates.clear();
                exchange.state = AuthState::Done;
                if let Some(ack) = exchange.deferred_ack.take() {
                    ctx.side_dispatch(ack);
                }
            }
            reply if reply.is_failure() && exchange.state == AuthState::Requested => {
                debug!(code = reply.code(), "SASL mechanism rejected");
                self.advance(&mut exchange, ctx)?;
            }
            SaslReply::Mechanisms(list) => {
                exchange.candidates.retain(|c| {
                    list.iter()
                        .any(|m| m.eq_ignore_ascii_case(c.provider.name()))
                });
                exchange.server_mechanisms = Some(list.clone());
            }
            SaslReply::LoggedIn { account } => exchange.account = Some(account.clone()),
            SaslReply::LoggedOut => exchange.account = None,
            _ => {}
        }
        Ok(Flow::Forward(event))
    }
}
