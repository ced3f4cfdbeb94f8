//! slirc-client - Straylight IRC client engine.
//!
//! The engine sits between a transport (which frames and decodes lines) and
//! an application. It owns three concerns:
//!
//! - **Dispatch**: every decoded inbound [`Event`] walks an ordered
//!   [`DispatchChain`] of [`Handler`]s which may forward, substitute,
//!   suppress or fan out events.
//! - **Correlation**: outbound requests are scheduled by priority through the
//!   [`OutboundQueue`] and registered with the [`AckRegistry`] as they hit the
//!   wire, so later server replies can be matched back to the request that
//!   caused them.
//! - **Negotiation**: [`CapabilityNegotiator`] drives `CAP LS/REQ/END` and
//!   [`SaslAuthenticator`] drives `AUTHENTICATE` with pluggable mechanisms.
//!
//! [`Session`] wires the pieces together for one connection.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use slirc_client::{Config, Credentials, InboundSignal, Session};
//! use slirc_client::outbound::ChannelTransport;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_toml("[sasl]\nmechanisms = [\"PLAIN\"]\n")?;
//! let session = Arc::new(
//!     Session::builder(config)
//!         .credentials(Arc::new(|_mech: &str| Some(Credentials::new("bot", "hunter2"))))
//!         .build(),
//! );
//!
//! let (line_tx, _line_rx) = mpsc::channel(64);
//! let (signal_tx, signal_rx) = mpsc::channel(64);
//!
//! let writer = session.clone();
//! tokio::spawn(async move {
//!     let mut transport = ChannelTransport::new(line_tx);
//!     writer.run_outbound(&mut transport).await
//! });
//!
//! signal_tx.send(InboundSignal::Connected).await?;
//! session.run_inbound(signal_rx).await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

pub mod ack;
pub mod caps;
pub mod casemap;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod outbound;
pub mod sasl;
pub mod session;
pub mod telemetry;

pub use self::ack::{AckCallback, AckMatcher, AckRegistry, Acknowledgement, EmissionKey};
pub use self::caps::{CapabilityContributor, CapabilityNegotiator, NegotiationPhase};
pub use self::config::Config;
pub use self::dispatch::{DispatchChain, DispatchContext, FaultSink, Flow, Handler};
pub use self::error::{
    DispatchError, EngineError, HandlerError, HandlerResult, InvalidEventError, QueueClosedError,
};
pub use self::event::{CapEntry, CapSubCommand, Direction, Event, EventFactory, EventKind, SaslReply, Sequence};
pub use self::outbound::{OutboundQueue, OutboundWriter, Priority, Transport};
pub use self::sasl::{AuthState, CredentialSource, Credentials, Mechanism, SaslAuthenticator};
pub use self::session::{InboundSignal, Session, SessionBuilder};
