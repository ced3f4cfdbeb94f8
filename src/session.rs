//! Connection context.
//!
//! A [`Session`] owns the per-connection pieces (event factory, outbound
//! queue, acknowledgment registry, dispatch chain) and the two flows that
//! drive them: the inbound flow, which dispatches decoded events one at a
//! time, and the outbound flow, which drains the queue into a transport.
//!
//! ## Chain Layout
//!
//! ```text
//! numeric-translator -> sasl -> capabilities -> application handlers...
//! ```
//!
//! The translator runs first so the authenticator sees typed SASL replies.
//! The authenticator runs ahead of the negotiator so it can hold back the
//! `CAP ACK` that would otherwise end negotiation early.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

use crate::ack::{AckRegistry, Acknowledgement, EmissionKey};
use crate::caps::CapabilityNegotiator;
use crate::config::{Config, validate};
use crate::dispatch::{DispatchChain, DispatchOutcome, FaultSink, Handler, NumericTranslator};
use crate::error::{EngineError, QueueClosedError};
use crate::event::{Event, EventFactory, EventKind};
use crate::outbound::{OutboundQueue, OutboundWriter, Priority, Transport, TransportError};
use crate::sasl::{CredentialSource, Credentials, MechanismProvider, SaslAuthenticator};
use crate::telemetry::spans;

/// What the transport layer reports to the inbound flow.
#[derive(Debug)]
pub enum InboundSignal {
    /// The connection is up. Runs the connect hooks.
    Connected,
    /// A decoded inbound event.
    Event(Event),
    /// The connection was lost.
    Disconnected,
    /// A connection attempt failed before it was established.
    ConnectFailed(String),
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: Config,
    credentials: Option<Arc<dyn CredentialSource>>,
    providers: Vec<Arc<dyn MechanismProvider>>,
    handlers: Vec<Arc<dyn Handler>>,
    fault_sink: Option<Arc<dyn FaultSink>>,
}

impl SessionBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            credentials: None,
            providers: Vec::new(),
            handlers: Vec::new(),
            fault_sink: None,
        }
    }

    /// Where SASL credentials come from. Without one, `sasl` is never
    /// requested.
    pub fn credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    /// Add a SASL mechanism beyond the built-in ones.
    pub fn mechanism(mut self, provider: Arc<dyn MechanismProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Append an application handler after the built-in ones.
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    /// Assemble the session. Configuration problems are logged, not fatal;
    /// call [`config::validate`](crate::config::validate) first to refuse them.
    pub fn build(self) -> Session {
        if let Err(errors) = validate(&self.config) {
            for error in &errors {
                warn!(%error, "Configuration problem");
            }
        }

        let factory = Arc::new(EventFactory::new());
        let outbound = Arc::new(OutboundQueue::new());
        let acks = Arc::new(AckRegistry::new());

        let credentials: Arc<dyn CredentialSource> = match self.credentials {
            Some(source) => source,
            None => Arc::new(|_: &str| -> Option<Credentials> { None }),
        };
        let authenticator = self.providers.into_iter().fold(
            SaslAuthenticator::new(self.config.sasl.clone(), credentials),
            SaslAuthenticator::with_provider,
        );
        let authenticator = Arc::new(authenticator);

        let negotiator = Arc::new(CapabilityNegotiator::new(self.config.capabilities.clone()));
        negotiator.register_contributor(authenticator.clone());

        let mut builder = DispatchChain::builder()
            .handler(NumericTranslator)
            .shared(authenticator.clone())
            .shared(negotiator.clone());
        for handler in self.handlers {
            builder = builder.shared(handler);
        }
        if let Some(sink) = self.fault_sink {
            builder = builder.fault_sink(sink);
        }
        let chain = builder.build(factory.clone(), outbound.clone());
        debug!(handlers = chain.len(), "Session assembled");

        Session {
            config: self.config,
            factory,
            outbound,
            acks,
            chain,
            negotiator,
            authenticator,
            epoch: AtomicU64::new(0),
        }
    }
}

/// One IRC connection's engine state.
pub struct Session {
    config: Config,
    factory: Arc<EventFactory>,
    outbound: Arc<OutboundQueue>,
    acks: Arc<AckRegistry>,
    chain: DispatchChain,
    negotiator: Arc<CapabilityNegotiator>,
    authenticator: Arc<SaslAuthenticator>,
    /// Number of connections established so far
    epoch: AtomicU64,
}

impl Session {
    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn factory(&self) -> &Arc<EventFactory> {
        &self.factory
    }

    pub fn outbound(&self) -> &Arc<OutboundQueue> {
        &self.outbound
    }

    pub fn acks(&self) -> &Arc<AckRegistry> {
        &self.acks
    }

    pub fn chain(&self) -> &DispatchChain {
        &self.chain
    }

    pub fn negotiator(&self) -> &Arc<CapabilityNegotiator> {
        &self.negotiator
    }

    pub fn authenticator(&self) -> &Arc<SaslAuthenticator> {
        &self.authenticator
    }

    /// Connections established so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Walk `event` through the chain, then offer the event as it arrived
    /// to the outstanding requests. Suppression or translation by a handler
    /// does not stop it acknowledging one.
    pub fn dispatch(&self, event: Event) -> DispatchOutcome {
        let arrived = event.clone();
        let outcome = self.chain.dispatch(event);
        self.acks.resolve(&arrived);
        outcome
    }

    /// Schedule an already built outbound event.
    pub fn enqueue(&self, event: Event, priority: Priority) -> Result<EmissionKey, QueueClosedError> {
        self.outbound.enqueue(event, priority)
    }

    /// Build an outbound event and schedule it.
    pub fn send(&self, kind: EventKind, priority: Priority) -> Result<EmissionKey, EngineError> {
        let event = self.factory.outbound(kind).finish()?;
        Ok(self.outbound.enqueue(event, priority)?)
    }

    /// Run `callback` once the request under `key` is acknowledged, whether
    /// the writer has drained it yet or not.
    ///
    /// Returns `false` (dropping the callback) for requests nothing
    /// acknowledges and for ones already settled or discarded.
    pub fn on_acknowledged<F>(&self, key: EmissionKey, callback: F) -> bool
    where
        F: FnOnce(&Acknowledgement) + Send + 'static,
    {
        self.outbound
            .on_acknowledged(&self.acks, key, Box::new(callback))
    }

    /// Start a new connection epoch and run the connect hooks.
    pub fn connected(&self) -> DispatchOutcome {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        info!(epoch, "Connected");
        self.chain.connected()
    }

    /// Forget everything tied to the lost connection.
    ///
    /// Outstanding acknowledgments are dropped without firing their
    /// callbacks and unsent requests are discarded.
    pub fn disconnected(&self) {
        // Discard before clearing so a request the writer already popped is stale.
        let discarded = self.outbound.discard();
        self.acks.clear();
        self.chain.disconnected();
        info!(epoch = self.epoch(), discarded, "Disconnected");
    }

    /// Process one signal from the transport layer.
    pub fn handle(&self, signal: InboundSignal) -> DispatchOutcome {
        match signal {
            InboundSignal::Connected => self.connected(),
            InboundSignal::Event(event) => self.dispatch(event),
            InboundSignal::Disconnected => {
                self.disconnected();
                DispatchOutcome::default()
            }
            InboundSignal::ConnectFailed(reason) => {
                warn!(%reason, "Connection attempt failed");
                self.disconnected();
                DispatchOutcome::default()
            }
        }
    }

    /// Inbound flow. Processes signals in order until the sender goes away,
    /// then closes the outbound queue.
    pub async fn run_inbound(&self, mut signals: mpsc::Receiver<InboundSignal>) {
        let span = spans::session(self.epoch());
        async {
            while let Some(signal) = signals.recv().await {
                let outcome = self.handle(signal);
                if outcome.faulted > 0 {
                    debug!(faulted = outcome.faulted, "Signal handled with faults");
                }
            }
        }
        .instrument(span)
        .await;
        self.shutdown();
    }

    /// Outbound flow. Drains the queue into `transport` until the queue is
    /// closed or a write fails.
    pub async fn run_outbound<T>(&self, transport: &mut T) -> Result<(), TransportError>
    where
        T: Transport + ?Sized,
    {
        OutboundWriter::new(self.outbound.clone(), self.acks.clone())
            .run(transport)
            .await
    }

    /// Stop accepting outbound requests. The writer finishes what is queued.
    pub fn shutdown(&self) {
        if !self.outbound.is_closed() {
            debug!("Session shutting down");
            self.outbound.close();
        }
    }
}
