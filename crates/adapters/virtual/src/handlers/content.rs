use async_trait::async_trait;

use funnelhub_app::task_handler::{HandlerError, TaskHandler};
use funnelhub_domain::id::OwnerId;
use funnelhub_domain::task::{Payload, TaskResult};

/// Drafts placeholder copy for the payload's `topic`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHandler;

impl ContentHandler {
    pub const TASK_TYPE: &'static str = "content";
}

#[async_trait]
impl TaskHandler for ContentHandler {
    async fn handle(&self, owner_id: OwnerId, payload: &Payload) -> Result<TaskResult, HandlerError> {
        let Some(topic) = payload
            .get("topic")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(TaskResult::failure("payload is missing 'topic'"));
        };
        let tone = payload
            .get("tone")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("friendly");
        let draft = format!("A {tone} introduction to {topic}.");
        tracing::info!(%owner_id, topic, "content drafted");
        Ok(TaskResult::ok("content drafted").with_data(serde_json::json!({
            "topic": topic,
            "tone": tone,
            "draft": draft,
        })))
    }
}
