//! Broadcast event bus for distributing `ApprovalEvent` to subscribers.
//!
//! Built on `tokio::sync::broadcast`. Notification delivery is out of the
//! engine's scope, so the bus is strictly fire-and-forget: publishing with
//! no active subscribers is a no-op and the engine never blocks on a
//! consumer.

use greenlight_types::event::ApprovalEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for approval lifecycle events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct EventBus {
    sender: broadcast::Sender<ApprovalEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: ApprovalEvent) {
        let _ = self.sender.send(event);
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenlight_types::id::{InstanceId, TaskId, UserId};

    fn task_assigned() -> ApprovalEvent {
        ApprovalEvent::TaskAssigned {
            task_id: TaskId::new(),
            instance_id: InstanceId::new(),
            node_id: "manager-review".to_string(),
            assignee_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(task_assigned());

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ApprovalEvent::TaskAssigned { .. }));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(task_assigned());

        assert!(matches!(
            rx1.recv().await.unwrap(),
            ApprovalEvent::TaskAssigned { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            ApprovalEvent::TaskAssigned { .. }
        ));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        // No subscribers -- should not panic
        bus.publish(task_assigned());
        bus.publish(task_assigned());
    }

    #[tokio::test]
    async fn lagged_receiver_handles_gracefully() {
        let bus = EventBus::new(4); // Small capacity to trigger lag
        let mut rx = bus.subscribe();

        for _ in 0..10 {
            bus.publish(task_assigned());
        }

        // Receiver may get a Lagged error -- should not panic
        match rx.try_recv() {
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(task_assigned());

        assert!(rx.try_recv().is_ok());
    }
}
