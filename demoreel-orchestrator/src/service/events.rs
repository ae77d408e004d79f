//! Demo event bus
//!
//! Broadcast channel carrying status changes. The SSE endpoint subscribes
//! per connection; stage workers publish after every successful status
//! write. Slow subscribers lag and miss events rather than blocking
//! publishers, which is fine because clients can always re-fetch the demo.

use demoreel_core::dto::demo::DemoEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DemoEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns quietly when nobody is listening.
    pub fn publish(&self, event: DemoEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DemoEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoreel_core::domain::demo::DemoStatus;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = DemoEvent {
            demo_id: Uuid::new_v4(),
            status: DemoStatus::Parsing,
            error: None,
        };
        bus.publish(event.clone());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.demo_id, event.demo_id);
        assert_eq!(received.status, DemoStatus::Parsing);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(16);
        bus.publish(DemoEvent {
            demo_id: Uuid::new_v4(),
            status: DemoStatus::Failed,
            error: Some("planning failed".to_string()),
        });
    }
}
