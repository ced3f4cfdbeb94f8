//! Outbound scheduling and acknowledgment correlation.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::TestPeer;
use slirc_client::{Config, EventKind, Priority, Session};

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.sasl.enabled = false;
    config
}

#[tokio::test]
async fn test_priority_drain_order() -> anyhow::Result<()> {
    let session = Session::builder(quiet_config()).build();
    for (token, priority) in [
        ("high-1", Priority::High),
        ("low", Priority::Low),
        ("high-2", Priority::High),
        ("normal", Priority::Normal),
    ] {
        session.send(
            EventKind::Pong {
                token: token.to_string(),
            },
            priority,
        )?;
    }

    let mut peer = TestPeer::start(session);
    peer.expect("PONG high-1").await?;
    peer.expect("PONG high-2").await?;
    peer.expect("PONG normal").await?;
    peer.expect("PONG low").await?;
    peer.stop().await
}

#[tokio::test]
async fn test_nick_failure_resolves_request() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    let key = peer
        .session
        .send(EventKind::Nick { nick: "bob".into() }, Priority::Normal)?;
    peer.expect("NICK bob").await?;
    assert!(peer.session.acks().is_outstanding(key));

    peer.numeric(433, &["*", "bob", "Nickname is already in use"])?;
    assert!(!peer.session.acks().is_outstanding(key));
    assert_eq!(peer.session.acks().outstanding(), 0);
    peer.stop().await
}

#[tokio::test]
async fn test_oldest_matching_request_wins() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    let bob = peer
        .session
        .send(EventKind::Nick { nick: "bob".into() }, Priority::Normal)?;
    let carol = peer
        .session
        .send(EventKind::Nick { nick: "carol".into() }, Priority::Normal)?;
    peer.expect("NICK bob").await?;
    peer.expect("NICK carol").await?;

    peer.feed_from("alice!a@host", EventKind::Nick { nick: "bob".into() })?;
    assert!(!peer.session.acks().is_outstanding(bob));
    assert!(peer.session.acks().is_outstanding(carol));
    assert_eq!(peer.session.acks().outstanding(), 1);
    peer.stop().await
}

/// An inbound event that is neither a nick change to the requested nick nor
/// a recognised failure numeric does not acknowledge a nick request.
#[tokio::test]
async fn test_unrelated_events_do_not_acknowledge_nick() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    let key = peer
        .session
        .send(EventKind::Nick { nick: "bob".into() }, Priority::Normal)?;
    peer.expect("NICK bob").await?;

    peer.feed_from("x!y@z", EventKind::Nick { nick: "dave".into() })?;
    peer.numeric(401, &["bob", "nobody", "No such nick/channel"])?;
    peer.feed(EventKind::Privmsg {
        targets: vec!["bob".into()],
        text: "hi".into(),
    })?;
    peer.feed(EventKind::Pong { token: "bob".into() })?;

    assert!(peer.session.acks().is_outstanding(key));
    peer.stop().await
}

#[tokio::test]
async fn test_completion_callback_fires_once() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    let fired = Arc::new(AtomicUsize::new(0));

    let key = peer.session.send(
        EventKind::Ping {
            token: "lag-1".into(),
        },
        Priority::High,
    )?;
    peer.expect("PING lag-1").await?;

    let counter = fired.clone();
    assert!(peer.session.acks().on_acknowledged(key, move |ack| {
        assert_eq!(ack.key, key);
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    peer.feed(EventKind::Pong {
        token: "lag-1".into(),
    })?;
    peer.feed(EventKind::Pong {
        token: "lag-1".into(),
    })?;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    peer.stop().await
}

#[tokio::test]
async fn test_callback_registered_while_request_is_queued() -> anyhow::Result<()> {
    let session = Session::builder(quiet_config()).build();
    let fired = Arc::new(AtomicUsize::new(0));

    // No writer is running yet, so the request is still in the queue.
    let key = session.send(
        EventKind::Ping {
            token: "lag-3".into(),
        },
        Priority::High,
    )?;
    assert!(!session.acks().is_outstanding(key));
    let counter = fired.clone();
    assert!(session.on_acknowledged(key, move |ack| {
        assert_eq!(ack.key, key);
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let mut peer = TestPeer::start(session);
    peer.expect("PING lag-3").await?;
    peer.feed(EventKind::Pong {
        token: "lag-3".into(),
    })?;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Unacknowledgeable and settled requests take no callback.
    let quit = peer.session.send(EventKind::Quit { reason: None }, Priority::Low)?;
    assert!(!peer.session.on_acknowledged(quit, |_| {}));
    assert!(!peer.session.on_acknowledged(key, |_| {}));
    peer.stop().await
}

#[tokio::test]
async fn test_queued_request_is_not_replayed_after_reconnect() -> anyhow::Result<()> {
    let session = Session::builder(quiet_config()).build();
    let fired = Arc::new(AtomicUsize::new(0));

    session.connected();
    let key = session.send(EventKind::Nick { nick: "bob".into() }, Priority::Normal)?;
    let counter = fired.clone();
    assert!(session.on_acknowledged(key, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    session.disconnected();
    session.connected();

    let mut peer = TestPeer::start(session);
    peer.expect("CAP LS 302").await?;
    peer.expect_quiet().await?;
    peer.feed(EventKind::Nick { nick: "bob".into() })?;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(!peer.session.acks().is_outstanding(key));
    peer.stop().await
}

#[tokio::test]
async fn test_disconnect_drops_callbacks_unfired() -> anyhow::Result<()> {
    let mut peer = TestPeer::with_config(quiet_config());
    let fired = Arc::new(AtomicUsize::new(0));

    let key = peer.session.send(
        EventKind::Ping {
            token: "lag-2".into(),
        },
        Priority::High,
    )?;
    peer.expect("PING lag-2").await?;
    let counter = fired.clone();
    peer.session.acks().on_acknowledged(key, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    peer.disconnect();
    peer.feed(EventKind::Pong {
        token: "lag-2".into(),
    })?;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(peer.session.acks().outstanding(), 0);
    peer.stop().await
}

#[tokio::test]
async fn test_sequences_increase_across_directions() -> anyhow::Result<()> {
    let session = Session::builder(quiet_config()).build();
    let factory = session.factory();
    let a = factory.inbound(EventKind::Ping { token: "1".into() }).finish()?;
    let b = factory.outbound(EventKind::Pong { token: "1".into() }).finish()?;
    let c = factory.inbound(EventKind::Ping { token: "2".into() }).finish()?;
    assert!(a.seq() < b.seq());
    assert!(b.seq() < c.seq());
    Ok(())
}
