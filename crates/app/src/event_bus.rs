//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::event::RecordEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<RecordEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: RecordEvent) -> impl Future<Output = Result<(), FunnelError>> + Send {
        // Zero receivers is the only send error.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnelhub_domain::automation::TriggerEvent;
    use funnelhub_domain::id::OwnerId;
    use funnelhub_domain::record::{Lead, Profile, Record};
    use funnelhub_domain::time::now;

    fn lead_created() -> RecordEvent {
        RecordEvent::created(Record::Lead(Lead::new(
            OwnerId::new(),
            Profile::default(),
            now(),
        )))
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = lead_created();
        let record_id = event.record.id();

        bus.publish(event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.record.id(), record_id);
        assert_eq!(received.event, TriggerEvent::NewLead);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = lead_created();
        let record_id = event.record.id();

        bus.publish(event).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().record.id(), record_id);
        assert_eq!(rx2.recv().await.unwrap().record.id(), record_id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert!(bus.publish(lead_created()).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(lead_created()).await.unwrap();

        let mut rx = bus.subscribe();

        let later = lead_created();
        let later_id = later.record.id();
        bus.publish(later).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().record.id(), later_id);
    }
}
