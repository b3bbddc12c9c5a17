//! # funnelhub-adapter-virtual
//!
//! Virtual/demo collaborators for running funnelhub without any external
//! service.
//!
//! ## Provided collaborators
//!
//! | Collaborator | Port | Behaviour |
//! |--------------|------|-----------|
//! | [`LogMailer`] | `Mailer` | Logs the template and recipient, remembers what was sent |
//! | [`MaintenanceHandler`] | `TaskHandler` for `maintenance` | Acknowledges known housekeeping operations |
//! | [`AnalyticsHandler`] | `TaskHandler` for `analytics` | Counts an owner's leads and contacts |
//! | [`ContentHandler`] | `TaskHandler` for `content` | Drafts a placeholder text for a topic |
//!
//! ## Dependency rule
//!
//! Depends on `funnelhub-app` (port traits) and `funnelhub-domain` only.

mod handlers;
mod mailer;

use std::sync::Arc;

use funnelhub_app::ports::RecordRepository;
use funnelhub_app::task_handler::HandlerRegistry;

pub use handlers::{AnalyticsHandler, ContentHandler, MaintenanceHandler};
pub use mailer::{LogMailer, SentEmail};

/// Register every demo handler under its task type.
pub fn register_handlers<RR>(registry: &mut HandlerRegistry, records: RR)
where
    RR: RecordRepository + 'static,
{
    registry.register(MaintenanceHandler::TASK_TYPE, Arc::new(MaintenanceHandler));
    registry.register(
        AnalyticsHandler::<RR>::TASK_TYPE,
        Arc::new(AnalyticsHandler::new(records)),
    );
    registry.register(ContentHandler::TASK_TYPE, Arc::new(ContentHandler));
}
