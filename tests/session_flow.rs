//! Inbound and outbound flows with application handlers.

mod common;

use std::sync::Arc;

use common::TestPeer;
use parking_lot::Mutex;
use slirc_client::error::HandlerError;
use slirc_client::{
    Config, DispatchContext, DispatchError, Event, EventKind, Flow, Handler, HandlerResult,
    InboundSignal, Priority, Session,
};
use tokio::sync::mpsc;

/// Records every message that reaches it.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Handler for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn on_message(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if let Some(text) = event.text() {
            self.seen.lock().push(text.to_string());
        }
        Ok(Flow::Forward(event))
    }
}

/// Answers PING and rejects messages containing "boom".
struct Responder;

impl Handler for Responder {
    fn name(&self) -> &'static str {
        "responder"
    }

    fn on_ping(&self, event: Event, ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if let EventKind::Ping { token } = event.kind() {
            ctx.send(
                EventKind::Pong {
                    token: token.clone(),
                },
                Priority::High,
            )?;
        }
        Ok(Flow::Suppress)
    }

    fn on_message(&self, event: Event, _ctx: &mut DispatchContext<'_>) -> HandlerResult {
        if event.text().is_some_and(|t| t.contains("boom")) {
            return Err(HandlerError::Internal("refusing boom".into()));
        }
        Ok(Flow::Forward(event))
    }
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.sasl.enabled = false;
    config.capabilities.request.clear();
    config
}

fn privmsg(text: &str) -> EventKind {
    EventKind::Privmsg {
        targets: vec!["#rust".into()],
        text: text.into(),
    }
}

#[tokio::test]
async fn test_application_handlers_run_in_order() -> anyhow::Result<()> {
    let recorder = Arc::new(Recorder::default());
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();

    let session = Session::builder(quiet_config())
        .handler(Arc::new(Responder))
        .handler(recorder.clone())
        .fault_sink(Arc::new(move |error: &DispatchError| {
            sink.lock().push(error.handler);
        }))
        .build();
    let mut peer = TestPeer::start(session);

    peer.feed(privmsg("hello"))?;
    let outcome = peer.feed(privmsg("boom"))?;
    assert_eq!(outcome.faulted, 1);
    peer.feed(privmsg("still here"))?;

    assert_eq!(*recorder.seen.lock(), ["hello", "still here"]);
    assert_eq!(*faults.lock(), ["responder"]);

    let outcome = peer.feed(EventKind::Ping {
        token: "abc".into(),
    })?;
    assert!(outcome.delivered.is_empty());
    peer.expect("PONG abc").await?;
    peer.stop().await
}

#[tokio::test]
async fn test_inbound_flow_over_channel() -> anyhow::Result<()> {
    let recorder = Arc::new(Recorder::default());
    let session = Arc::new(
        Session::builder(quiet_config())
            .handler(recorder.clone())
            .build(),
    );

    let (tx, rx) = mpsc::channel(16);
    let inbound = session.clone();
    let reader = tokio::spawn(async move { inbound.run_inbound(rx).await });

    tx.send(InboundSignal::Connected).await?;
    for text in ["one", "two", "three"] {
        let event = session.factory().inbound(privmsg(text)).finish()?;
        tx.send(InboundSignal::Event(event)).await?;
    }
    drop(tx);
    reader.await?;

    assert_eq!(*recorder.seen.lock(), ["one", "two", "three"]);
    assert_eq!(session.epoch(), 1);
    assert!(session.outbound().is_closed());
    // CAP LS is still queued; a closed queue keeps what it holds.
    assert_eq!(session.outbound().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_connect_failure_resets_state() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    peer.connect();
    peer.expect("CAP LS 302").await?;

    peer.session
        .handle(InboundSignal::ConnectFailed("connection refused".into()));
    assert_eq!(
        peer.session.negotiator().phase(),
        slirc_client::NegotiationPhase::Idle
    );
    assert!(peer.session.outbound().is_empty());
    peer.stop().await
}

#[tokio::test]
async fn test_invalid_events_are_rejected() -> anyhow::Result<()> {
    let session = Session::builder(quiet_config()).build();
    let err = session
        .send(EventKind::Nick { nick: String::new() }, Priority::Normal)
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid NICK event: nick is required");
    assert!(session.outbound().is_empty());

    session.shutdown();
    assert!(
        session
            .send(EventKind::Pong { token: "x".into() }, Priority::Low)
            .is_err()
    );
    Ok(())
}
