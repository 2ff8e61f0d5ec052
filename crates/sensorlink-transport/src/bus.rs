//! Broadcast bus for connection notifications.
//!
//! Uses [`tokio::sync::broadcast`] so that every listener (status display,
//! sensor feed, logging) sees every [`LinkEvent`] and a slow listener never
//! blocks the transport.
//!
//! Subscribe *before* handing the bus to
//! [`TransportClient::connect`][crate::TransportClient::connect]; events
//! published while nobody listens are dropped.

use sensorlink_types::{LinkError, LinkEvent};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channel.
#[derive(Clone, Debug)]
pub struct LinkEventBus {
    sender: broadcast::Sender<LinkEvent>,
}

impl LinkEventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the event, or a
    /// [`LinkError::Transport`] error when nobody is subscribed.
    pub fn publish(&self, event: LinkEvent) -> Result<usize, LinkError> {
        self.sender
            .send(event)
            .map_err(|e| LinkError::Transport(format!("link event bus send error: {e}")))
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.sender.subscribe()
    }

    /// Subscribe and return a [`LinkEventSubscriber`] that only yields
    /// events of the named kind (`"open"`, `"message"`, `"error"`, `"close"`).
    pub fn subscribe_kind(&self, kind: &'static str) -> LinkEventSubscriber {
        LinkEventSubscriber {
            kind,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LinkEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber that only delivers events of a single kind.
pub struct LinkEventSubscriber {
    kind: &'static str,
    receiver: broadcast::Receiver<LinkEvent>,
}

impl LinkEventSubscriber {
    /// Wait for the next event of this subscriber's kind.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.kind.name() == self.kind => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(kind = self.kind, lagged_by = n, "LinkEventSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlink_types::{CloseInfo, LinkEventKind};

    fn make_event(kind: LinkEventKind) -> LinkEvent {
        LinkEvent::new("sensorlink-transport::test", kind)
    }

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LinkEventBus::default();
        let mut rx = bus.subscribe();

        let event = make_event(LinkEventKind::Open);
        bus.publish(event.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.kind, LinkEventKind::Open);
        Ok(())
    }

    #[tokio::test]
    async fn kind_subscriber_filters() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LinkEventBus::default();
        let mut closes = bus.subscribe_kind("close");

        bus.publish(make_event(LinkEventKind::Open))?;
        bus.publish(make_event(LinkEventKind::Message(vec![1, 2])))?;
        let close = make_event(LinkEventKind::Close(CloseInfo::new(None, "gone")));
        bus.publish(close.clone())?;

        let received = closes.recv().await.ok_or("no close event")?;
        assert_eq!(received.id, close.id);
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LinkEventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        let event = make_event(LinkEventKind::Error("boom".into()));
        bus.publish(event.clone())?;

        assert_eq!(rx1.recv().await?.id, event.id);
        assert_eq!(rx2.recv().await?.id, event.id);
        Ok(())
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = LinkEventBus::default();
        assert!(bus.publish(make_event(LinkEventKind::Open)).is_err());
    }

    #[tokio::test]
    async fn kind_subscriber_returns_none_when_bus_dropped() {
        let bus = LinkEventBus::default();
        let mut sub = bus.subscribe_kind("open");
        drop(bus);
        assert!(sub.recv().await.is_none());
    }
}
