//! Built-in demo task handlers.

mod analytics;
mod content;
mod maintenance;

pub use analytics::AnalyticsHandler;
pub use content::ContentHandler;
pub use maintenance::MaintenanceHandler;
