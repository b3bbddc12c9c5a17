//! Task dispatcher — claims due tasks and runs their handlers.
//!
//! One [`Dispatcher::tick`] selects up to `batch_size` due tasks in
//! `priority DESC, scheduled_for ASC` order, claims them one by one in that
//! order, then runs all claimed handlers concurrently. A handler error or
//! panic fails its own task only.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::TaskId;
use funnelhub_domain::task::{Task, TaskResult};

use crate::clock::Clock;
use crate::ports::TaskRepository;
use crate::task_handler::HandlerRegistry;

/// Default number of tasks claimed per tick.
pub const DEFAULT_BATCH_SIZE: u32 = 5;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Claimed tasks, in selection order.
    pub claimed: Vec<TaskId>,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
}

/// Polls the task store and runs due tasks.
pub struct Dispatcher<TR> {
    tasks: TR,
    handlers: HandlerRegistry,
    clock: Arc<dyn Clock>,
    batch_size: u32,
}

impl<TR: TaskRepository> Dispatcher<TR> {
    pub fn new(tasks: TR, handlers: HandlerRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks,
            handlers,
            clock,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Claim and run one batch of due tasks.
    ///
    /// # Errors
    ///
    /// Returns a storage error if selecting due tasks fails. Errors while
    /// claiming or completing a single task are logged and only affect
    /// that task.
    pub async fn tick(&self) -> Result<DispatchReport, FunnelError> {
        let now = self.clock.now();
        let due = self.tasks.find_due(now, self.batch_size).await?;
        let mut report = DispatchReport::default();

        let mut claimed = Vec::with_capacity(due.len());
        for task in due {
            match self.tasks.claim(task.id, now).await {
                Ok(true) => {
                    tracing::info!(task_id = %task.id, task_type = %task.task_type, priority = task.priority.get(), "claimed task");
                    report.claimed.push(task.id);
                    claimed.push(task);
                }
                Ok(false) => {
                    tracing::debug!(task_id = %task.id, "task claimed elsewhere, skipping");
                }
                Err(err) => {
                    tracing::error!(%err, task_id = %task.id, "failed to claim task");
                }
            }
        }

        let results = join_all(claimed.iter().map(|task| self.run(task))).await;

        for (task, result) in claimed.iter().zip(results) {
            let success = result.success;
            if let Err(err) = self.tasks.complete(task.id, result, self.clock.now()).await {
                tracing::error!(%err, task_id = %task.id, "failed to store task result");
                continue;
            }
            if success {
                tracing::info!(task_id = %task.id, task_type = %task.task_type, "task completed");
                report.completed.push(task.id);
            } else {
                report.failed.push(task.id);
            }
        }

        Ok(report)
    }

    async fn run(&self, task: &Task) -> TaskResult {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            tracing::warn!(task_id = %task.id, task_type = %task.task_type, "no handler registered");
            return TaskResult::failure(format!(
                "no handler registered for task type '{}'",
                task.task_type
            ));
        };

        let outcome = AssertUnwindSafe(handler.handle(task.owner_id, &task.payload))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                if !result.success {
                    tracing::warn!(
                        task_id = %task.id,
                        task_type = %task.task_type,
                        error = result.error.as_deref().unwrap_or_default(),
                        "task reported failure"
                    );
                }
                result
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, task_id = %task.id, task_type = %task.task_type, "task handler failed");
                TaskResult::failure(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(task_id = %task.id, task_type = %task.task_type, %message, "task handler panicked");
                TaskResult::failure(format!("handler panicked: {message}"))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
