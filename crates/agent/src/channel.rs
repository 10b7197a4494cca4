//! Disconnect-tolerant event delivery between the loop and its consumer.
//!
//! The queue is unbounded so the loop never waits on a slow or absent
//! reader. Once the receiver is dropped, sends are discarded. The loop ends
//! every run by closing the sender, which queues a terminal sentinel.

use futures::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::stream_event::StreamEvent;

enum Envelope {
    Event(StreamEvent),
    Close,
}

/// Create a connected sender/receiver pair.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx, closed: false })
}

/// Producer half, owned by the running loop.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    /// Push an event. Returns `false` when the consumer has gone away.
    pub fn send(&self, event: StreamEvent) -> bool {
        let event_type = event.event_type();
        let delivered = self.tx.send(Envelope::Event(event)).is_ok();
        trace!(event = event_type, delivered, "Run event");
        delivered
    }

    /// Whether the consumer is still attached.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue the terminal sentinel.
    pub fn close(self) {
        let _ = self.tx.send(Envelope::Close);
    }
}

/// Consumer half.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
    closed: bool,
}

impl EventReceiver {
    /// The next event, or `None` once the sentinel has been seen or the
    /// producer is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }
        match self.rx.recv().await {
            Some(Envelope::Event(event)) => Some(event),
            Some(Envelope::Close) | None => {
                self.closed = true;
                None
            }
        }
    }

    /// Drain every remaining event.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        futures::stream::unfold(self, |mut rx| async move {
            let event = rx.recv().await?;
            Some((event, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn events_arrive_in_order_until_sentinel() {
        let (tx, rx) = event_channel();
        assert!(tx.send(StreamEvent::TextChunk("a".into())));
        assert!(tx.send(StreamEvent::TextChunk("b".into())));
        let extra = tx.clone();
        tx.close();
        // Anything queued after the sentinel is never observed.
        extra.send(StreamEvent::Error("late".into()));

        let events = rx.collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::TextChunk("a".into()),
                StreamEvent::TextChunk("b".into())
            ]
        );
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_is_discarded() {
        let (tx, rx) = event_channel();
        drop(rx);
        assert!(!tx.is_attached());
        assert!(!tx.send(StreamEvent::TextChunk("lost".into())));
        tx.close();
    }

    #[tokio::test]
    async fn dropped_sender_ends_stream() {
        let (tx, rx) = event_channel();
        tx.send(StreamEvent::TextChunk("only".into()));
        drop(tx);
        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn recv_after_close_stays_none() {
        let (tx, mut rx) = event_channel();
        tx.close();
        assert!(rx.recv().await.is_none());
        assert!(rx.recv().await.is_none());
    }
}
