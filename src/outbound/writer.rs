//! Single-task queue drain.

use std::sync::Arc;

use tracing::{Instrument, debug, trace, warn};

use super::{OutboundQueue, PendingOutbound, Transport, TransportError};
use crate::ack::AckRegistry;
use crate::telemetry::spans;

/// Drains an [`OutboundQueue`] into a [`Transport`].
///
/// Exactly one writer should drain a given queue. Each item is registered
/// with the [`AckRegistry`] as it leaves the queue, before its write is
/// issued, and withdrawn again if the write fails or the queue was discarded
/// in the meantime.
#[derive(Debug, Clone)]
pub struct OutboundWriter {
    queue: Arc<OutboundQueue>,
    acks: Arc<AckRegistry>,
}

impl OutboundWriter {
    pub fn new(queue: Arc<OutboundQueue>, acks: Arc<AckRegistry>) -> Self {
        Self { queue, acks }
    }

    /// Write the next pending item, if any. Returns whether one was written.
    pub async fn drain_one<T>(&self, transport: &mut T) -> Result<bool, TransportError>
    where
        T: Transport + ?Sized,
    {
        match self.queue.try_next_registered(&self.acks) {
            Some(item) => self.write(item, transport).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Drain until the queue is closed and empty, or a write fails.
    pub async fn run<T>(&self, transport: &mut T) -> Result<(), TransportError>
    where
        T: Transport + ?Sized,
    {
        while let Some(item) = self.queue.next_registered(&self.acks).await {
            self.write(item, transport).await?;
        }
        trace!("Outbound queue closed, writer finished");
        Ok(())
    }

    /// Write an item already popped (and registered) by
    /// [`OutboundQueue::next_registered`]. Items from a discarded generation
    /// are withdrawn and skipped.
    pub async fn write<T>(&self, item: PendingOutbound, transport: &mut T) -> Result<(), TransportError>
    where
        T: Transport + ?Sized,
    {
        let PendingOutbound {
            key,
            event,
            priority,
            enqueued_at,
            generation,
            ..
        } = item;

        if generation != self.queue.generation() {
            self.acks.withdraw(key);
            debug!(%key, seq = %event.seq(), kind = event.name(), "Dropped request from a discarded queue");
            return Ok(());
        }

        let span = spans::drain(event.seq(), event.name(), priority);
        match transport.send(&event).instrument(span).await {
            Ok(()) => {
                trace!(
                    %key,
                    seq = %event.seq(),
                    kind = event.name(),
                    queued_us = enqueued_at.elapsed().as_micros() as u64,
                    "Written"
                );
                Ok(())
            }
            Err(e) => {
                self.acks.withdraw(key);
                warn!(%key, seq = %event.seq(), kind = event.name(), error = %e, "Write failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::event::{Event, EventFactory, EventKind};
    use crate::outbound::{ChannelTransport, Priority};

    struct Broken;

    #[async_trait]
    impl Transport for Broken {
        async fn send(&mut self, _event: &Event) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }
    }

    fn nick(factory: &EventFactory, nick: &str) -> Event {
        factory
            .outbound(EventKind::Nick { nick: nick.into() })
            .finish()
            .unwrap()
    }

    #[tokio::test]
    async fn registers_before_write() {
        let factory = EventFactory::new();
        let queue = Arc::new(OutboundQueue::new());
        let acks = Arc::new(AckRegistry::new());
        let writer = OutboundWriter::new(queue.clone(), acks.clone());
        let (tx, mut rx) = mpsc::channel(4);
        let mut transport = ChannelTransport::new(tx);

        let key = queue.enqueue(nick(&factory, "bob"), Priority::Normal).unwrap();
        assert!(!acks.is_outstanding(key));
        assert!(writer.drain_one(&mut transport).await.unwrap());
        assert!(acks.is_outstanding(key));
        assert_eq!(rx.recv().await.as_deref(), Some("NICK bob"));
        assert!(!writer.drain_one(&mut transport).await.unwrap());
    }

    #[tokio::test]
    async fn failed_write_withdraws_registration() {
        let factory = EventFactory::new();
        let queue = Arc::new(OutboundQueue::new());
        let acks = Arc::new(AckRegistry::new());
        let writer = OutboundWriter::new(queue.clone(), acks.clone());

        let key = queue.enqueue(nick(&factory, "bob"), Priority::Normal).unwrap();
        let err = writer.drain_one(&mut Broken).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(!acks.is_outstanding(key));
    }

    #[tokio::test]
    async fn item_popped_before_discard_is_not_written() {
        let factory = EventFactory::new();
        let queue = Arc::new(OutboundQueue::new());
        let acks = Arc::new(AckRegistry::new());
        let writer = OutboundWriter::new(queue.clone(), acks.clone());
        let (tx, mut rx) = mpsc::channel(4);
        let mut transport = ChannelTransport::new(tx);

        // Popped by the writer, then the connection drops before the write.
        let key = queue.enqueue(nick(&factory, "bob"), Priority::Normal).unwrap();
        let item = queue.try_next_registered(&acks).unwrap();
        assert!(acks.is_outstanding(key));
        queue.discard();

        writer.write(item, &mut transport).await.unwrap();
        assert!(!acks.is_outstanding(key));
        assert_eq!(acks.outstanding(), 0);

        // The next epoch is written normally.
        queue.enqueue(nick(&factory, "carol"), Priority::Normal).unwrap();
        assert!(writer.drain_one(&mut transport).await.unwrap());
        assert_eq!(rx.recv().await.as_deref(), Some("NICK carol"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn callback_attached_while_queued_survives_the_drain() {
        let factory = EventFactory::new();
        let queue = Arc::new(OutboundQueue::new());
        let acks = Arc::new(AckRegistry::new());
        let writer = OutboundWriter::new(queue.clone(), acks.clone());
        let (tx, mut rx) = mpsc::channel(4);
        let mut transport = ChannelTransport::new(tx);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let key = queue.enqueue(nick(&factory, "bob"), Priority::Normal).unwrap();
        assert!(queue.on_acknowledged(&acks, key, Box::new(move |ack: &crate::ack::Acknowledgement| {
            let _ = done_tx.send(ack.key);
        })));
        assert!(writer.drain_one(&mut transport).await.unwrap());
        assert_eq!(rx.recv().await.as_deref(), Some("NICK bob"));

        let reply = factory
            .inbound(EventKind::Nick { nick: "bob".into() })
            .finish()
            .unwrap();
        acks.resolve(&reply);
        assert_eq!(done_rx.try_recv().ok(), Some(key));
    }

    #[tokio::test]
    async fn run_stops_when_closed() {
        let factory = EventFactory::new();
        let queue = Arc::new(OutboundQueue::new());
        let writer = OutboundWriter::new(queue.clone(), Arc::new(AckRegistry::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let mut transport = ChannelTransport::new(tx);

        queue.enqueue(nick(&factory, "a"), Priority::Low).unwrap();
        queue.enqueue(nick(&factory, "b"), Priority::High).unwrap();
        queue.close();
        writer.run(&mut transport).await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("NICK b"));
        assert_eq!(rx.recv().await.as_deref(), Some("NICK a"));
    }
}
