//! Event fan-out — a broadcast bus with topic-filtered subscriptions.
//!
//! Every consumer holds its own [`EventSubscription`]; dropping it
//! unsubscribes. Slow consumers lag (oldest events are skipped) instead of
//! back-pressuring the driver.

use std::collections::HashSet;

use futures_util::stream::Stream;
use tokio::sync::broadcast;

use crate::ws::WsEvent;

/// Event categories consumers can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Connected, Authenticated, Disconnected, Reconnecting.
    Connection,
    Ticker,
    OrderBook,
    Trade,
    Balance,
    Position,
    Order,
    UserTrade,
    Subscription,
    Unknown,
    Error,
}

impl WsEvent {
    pub fn topic(&self) -> Topic {
        match self {
            WsEvent::Connected
            | WsEvent::Authenticated
            | WsEvent::Disconnected { .. }
            | WsEvent::Reconnecting { .. } => Topic::Connection,
            WsEvent::Ticker(_) => Topic::Ticker,
            WsEvent::OrderBook { .. } => Topic::OrderBook,
            WsEvent::Trade(_) => Topic::Trade,
            WsEvent::Balance(_) => Topic::Balance,
            WsEvent::Position(_) | WsEvent::PositionClosed { .. } => Topic::Position,
            WsEvent::Order(_) | WsEvent::OrderRemoved(_) => Topic::Order,
            WsEvent::UserTrade(_) => Topic::UserTrade,
            WsEvent::SubscriptionAck { .. } => Topic::Subscription,
            WsEvent::Unknown { .. } => Topic::Unknown,
            WsEvent::Error(_) => Topic::Error,
        }
    }
}

/// Broadcast sender shared by the router and driver.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WsEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to every live subscription. Having none is not an error.
    pub fn publish(&self, event: WsEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to `topics`; an empty slice means every topic.
    pub fn subscribe(&self, topics: &[Topic]) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
            topics: topics.iter().copied().collect(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A disposable, topic-filtered handle on the event bus.
pub struct EventSubscription {
    rx: broadcast::Receiver<WsEvent>,
    topics: HashSet<Topic>,
}

impl EventSubscription {
    fn accepts(&self, event: &WsEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }

    /// Next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<WsEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscription lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<WsEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscription lagged, skipped {} event(s)", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Consume the handle as a `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = WsEvent> + Send {
        async_stream::stream! {
            let mut subscription = self;
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WsError;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_topic_filter() {
        let bus = EventBus::new(16);
        let mut errors = bus.subscribe(&[Topic::Error]);
        let mut everything = bus.subscribe(&[]);

        bus.publish(WsEvent::Connected);
        bus.publish(WsEvent::Error(WsError::NotConnected));

        assert!(matches!(errors.recv().await, Some(WsEvent::Error(WsError::NotConnected))));
        assert!(errors.try_recv().is_none());
        assert!(matches!(everything.recv().await, Some(WsEvent::Connected)));
        assert!(matches!(everything.recv().await, Some(WsEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe(&[]);
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(WsEvent::Connected);
    }

    #[tokio::test]
    async fn test_stream_ends_when_bus_dropped() {
        let bus = EventBus::new(16);
        let stream = bus.subscribe(&[Topic::Connection]).into_stream();
        bus.publish(WsEvent::Authenticated);
        drop(bus);
        let events: Vec<WsEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WsEvent::Authenticated));
    }

    #[tokio::test]
    async fn test_lagged_subscription_keeps_going() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(&[]);
        for _ in 0..5 {
            bus.publish(WsEvent::Connected);
        }
        bus.publish(WsEvent::Authenticated);
        let mut last = None;
        while let Some(event) = sub.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(WsEvent::Authenticated)));
    }
}
