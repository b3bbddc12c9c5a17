//! Task handlers — the code that runs a task of a given type.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use funnelhub_domain::id::OwnerId;
use funnelhub_domain::task::{Payload, TaskResult};

/// Unexpected handler failure. Business failures are reported as
/// `Ok(TaskResult { success: false, .. })` instead.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Runs tasks of one type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, owner_id: OwnerId, payload: &Payload)
    -> Result<TaskResult, HandlerError>;
}

/// Maps task type strings to their handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `task_type`, replacing any previous one.
    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.into(), handler);
    }

    /// Builder-style [`Self::register`].
    #[must_use]
    pub fn with(mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(task_type, handler);
        self
    }

    #[must_use]
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Registered task types, sorted.
    #[must_use]
    pub fn task_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn handle(
            &self,
            _owner_id: OwnerId,
            payload: &Payload,
        ) -> Result<TaskResult, HandlerError> {
            Ok(TaskResult::ok("echoed").with_data(serde_json::Value::Object(payload.clone())))
        }
    }

    #[tokio::test]
    async fn should_resolve_registered_handler_by_type() {
        let registry = HandlerRegistry::new().with("echo", Arc::new(Echo));
        let handler = registry.get("echo").unwrap();
        let mut payload = Payload::new();
        payload.insert("k".into(), serde_json::json!(1));

        let result = handler.handle(OwnerId::new(), &payload).await.unwrap();

        assert!(result.success);
        assert_eq!(result.data, Some(serde_json::json!({"k": 1})));
    }

    #[test]
    fn should_return_none_for_unknown_type() {
        let registry = HandlerRegistry::new().with("echo", Arc::new(Echo));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn should_list_task_types_sorted() {
        let registry = HandlerRegistry::new()
            .with("zeta", Arc::new(Echo))
            .with("alpha", Arc::new(Echo));
        assert_eq!(registry.task_types(), vec!["alpha", "zeta"]);
    }
}
