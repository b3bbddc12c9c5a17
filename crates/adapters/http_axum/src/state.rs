//! Shared application state for axum handlers.

use std::sync::Arc;

use funnelhub_app::ports::{AutomationRepository, EventPublisher, RecordRepository, TaskRepository};
use funnelhub_app::services::automation_service::AutomationService;
use funnelhub_app::services::record_service::RecordService;
use funnelhub_app::services::task_service::TaskService;

/// Application state shared across all axum handlers.
///
/// Generic over the repository types and event publisher to avoid dynamic
/// dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<TR, AR, RR, EP> {
    pub task_service: Arc<TaskService<TR>>,
    pub automation_service: Arc<AutomationService<AR>>,
    pub record_service: Arc<RecordService<RR, EP>>,
}

impl<TR, AR, RR, EP> Clone for AppState<TR, AR, RR, EP> {
    fn clone(&self) -> Self {
        Self {
            task_service: Arc::clone(&self.task_service),
            automation_service: Arc::clone(&self.automation_service),
            record_service: Arc::clone(&self.record_service),
        }
    }
}

impl<TR, AR, RR, EP> AppState<TR, AR, RR, EP>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(
        task_service: TaskService<TR>,
        automation_service: AutomationService<AR>,
        record_service: RecordService<RR, EP>,
    ) -> Self {
        Self::from_arcs(
            Arc::new(task_service),
            Arc::new(automation_service),
            Arc::new(record_service),
        )
    }

    /// Create a new application state from pre-wrapped `Arc` services.
    ///
    /// Use this when services need to be shared with background tasks
    /// before constructing the HTTP state.
    pub fn from_arcs(
        task_service: Arc<TaskService<TR>>,
        automation_service: Arc<AutomationService<AR>>,
        record_service: Arc<RecordService<RR, EP>>,
    ) -> Self {
        Self {
            task_service,
            automation_service,
            record_service,
        }
    }
}
