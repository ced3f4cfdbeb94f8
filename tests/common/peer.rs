//! Scripted server peer.
//!
//! Owns a [`Session`] whose outbound flow runs on a background task writing
//! into a channel. Tests feed inbound events directly and read the written
//! lines back.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use slirc_client::dispatch::DispatchOutcome;
use slirc_client::outbound::{ChannelTransport, TransportError};
use slirc_client::{CapEntry, CapSubCommand, Config, EventKind, InboundSignal, Session};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub struct TestPeer {
    pub session: Arc<Session>,
    lines: mpsc::Receiver<String>,
    writer: JoinHandle<Result<(), TransportError>>,
}

impl TestPeer {
    /// Start the outbound flow for `session`.
    pub fn start(session: Session) -> Self {
        let session = Arc::new(session);
        let (tx, lines) = mpsc::channel(64);
        let drain = session.clone();
        let writer = tokio::spawn(async move {
            let mut transport = ChannelTransport::new(tx);
            drain.run_outbound(&mut transport).await
        });
        Self {
            session,
            lines,
            writer,
        }
    }

    pub fn with_config(config: Config) -> Self {
        Self::start(Session::builder(config).build())
    }

    pub fn connect(&self) -> DispatchOutcome {
        self.session.handle(InboundSignal::Connected)
    }

    pub fn disconnect(&self) {
        self.session.handle(InboundSignal::Disconnected);
    }

    /// Dispatch an inbound event built from `kind`.
    pub fn feed(&self, kind: EventKind) -> anyhow::Result<DispatchOutcome> {
        let event = self.session.factory().inbound(kind).finish()?;
        Ok(self.session.handle(InboundSignal::Event(event)))
    }

    /// Dispatch an inbound event with a source prefix.
    pub fn feed_from(&self, source: &str, kind: EventKind) -> anyhow::Result<DispatchOutcome> {
        let event = self
            .session
            .factory()
            .inbound(kind)
            .source(source)
            .finish()?;
        Ok(self.session.handle(InboundSignal::Event(event)))
    }

    pub fn numeric(&self, code: u16, params: &[&str]) -> anyhow::Result<DispatchOutcome> {
        self.feed(EventKind::Numeric {
            code,
            params: params.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn cap(&self, sub: CapSubCommand, list: &str, more: bool) -> anyhow::Result<DispatchOutcome> {
        self.feed(EventKind::Cap {
            sub,
            caps: CapEntry::parse_list(list),
            more,
            version: None,
        })
    }

    pub fn authenticate(&self, payload: &str) -> anyhow::Result<DispatchOutcome> {
        self.feed(EventKind::Authenticate {
            payload: payload.to_string(),
        })
    }

    /// Receive one written line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        timeout(dur, self.lines.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("transport channel closed"))
    }

    /// Receive one line and check it.
    pub async fn expect(&mut self, line: &str) -> anyhow::Result<()> {
        let got = self.recv().await?;
        anyhow::ensure!(got == line, "expected `{line}`, got `{got}`");
        Ok(())
    }

    /// Check that nothing is written for a short while.
    pub async fn expect_quiet(&mut self) -> anyhow::Result<()> {
        match timeout(Duration::from_millis(100), self.lines.recv()).await {
            Ok(Some(line)) => anyhow::bail!("unexpected line `{line}`"),
            _ => Ok(()),
        }
    }

    /// Close the queue and wait for the writer to finish.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.session.shutdown();
        self.writer.await??;
        Ok(())
    }
}
