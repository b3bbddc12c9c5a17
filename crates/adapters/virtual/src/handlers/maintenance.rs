use async_trait::async_trait;

use funnelhub_app::task_handler::{HandlerError, TaskHandler};
use funnelhub_domain::id::OwnerId;
use funnelhub_domain::task::{Payload, TaskResult};

const OPERATIONS: [&str; 3] = ["cleanup", "reindex", "vacuum"];

/// Acknowledges a housekeeping `operation` from the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceHandler;

impl MaintenanceHandler {
    pub const TASK_TYPE: &'static str = "maintenance";
}

#[async_trait]
impl TaskHandler for MaintenanceHandler {
    async fn handle(&self, owner_id: OwnerId, payload: &Payload) -> Result<TaskResult, HandlerError> {
        let operation = payload
            .get("operation")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("cleanup");
        if !OPERATIONS.contains(&operation) {
            return Ok(TaskResult::failure(format!(
                "unknown maintenance operation '{operation}'"
            )));
        }
        tracing::info!(%owner_id, operation, "maintenance run");
        Ok(TaskResult::ok(format!("maintenance '{operation}' completed")))
    }
}
