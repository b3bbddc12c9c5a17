//! Event bus port — publish/subscribe for record events.

use std::future::Future;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::event::RecordEvent;

/// Publishes record events to interested subscribers.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: RecordEvent) -> impl Future<Output = Result<(), FunnelError>> + Send;
}

impl<T: EventPublisher> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: RecordEvent) -> impl Future<Output = Result<(), FunnelError>> + Send {
        (**self).publish(event)
    }
}
