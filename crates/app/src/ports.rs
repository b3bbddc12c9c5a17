//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_repo;
pub mod collaborators;
pub mod event_bus;
pub mod record_repo;
pub mod task_repo;

pub use automation_repo::{AutomationQuery, AutomationRepository};
pub use collaborators::{Conversion, LeadConverter, Mailer, WebhookClient};
pub use event_bus::EventPublisher;
pub use record_repo::{RecordQuery, RecordRepository};
pub use task_repo::{TaskQuery, TaskRepository};
