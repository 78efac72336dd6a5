//! Broadcast event bus for `EngineEvent`.
//!
//! Publishing with no active subscribers is a no-op; a slow subscriber lags
//! and skips events rather than blocking the runner.

use arflow_types::event::EngineEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for instance lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
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
    use arflow_types::state::WorkflowStatus;

    fn finished(id: &str) -> EngineEvent {
        EngineEvent::InstanceFinished {
            instance_id: id.to_string(),
            status: WorkflowStatus::Completed,
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(finished("a"));

        assert_eq!(rx1.recv().await.unwrap().instance_id(), "a");
        assert_eq!(rx2.recv().await.unwrap().instance_id(), "a");
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish(finished("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn lagged_receiver_reports_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..6 {
            bus.publish(finished(&format!("inst-{i}")));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }
}
