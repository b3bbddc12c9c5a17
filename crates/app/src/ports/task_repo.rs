//! Task repository port — the persistent task queue.

use std::future::Future;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::{OwnerId, TaskId};
use funnelhub_domain::page::{Page, Paginated};
use funnelhub_domain::task::{Task, TaskResult, TaskStatus};
use funnelhub_domain::time::Timestamp;

/// Filters for [`TaskRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub owner_id: OwnerId,
    pub status: Option<TaskStatus>,
    pub task_type: Option<String>,
    pub page: Page,
}

impl TaskQuery {
    #[must_use]
    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            status: None,
            task_type: None,
            page: Page::default(),
        }
    }

    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        task.owner_id == self.owner_id
            && self.status.is_none_or(|status| task.status == status)
            && self
                .task_type
                .as_deref()
                .is_none_or(|task_type| task.task_type == task_type)
    }
}

/// Repository for persisting, querying and claiming [`Task`]s.
pub trait TaskRepository: Send + Sync {
    /// Insert a new task.
    fn create(&self, task: Task) -> impl Future<Output = Result<Task, FunnelError>> + Send;

    /// Get a task by its unique identifier.
    fn get_by_id(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<Task>, FunnelError>> + Send;

    /// One page of tasks matching `query`, newest first.
    fn list(
        &self,
        query: TaskQuery,
    ) -> impl Future<Output = Result<Paginated<Task>, FunnelError>> + Send;

    /// Up to `limit` pending tasks with `scheduled_for <= now`, ordered by
    /// `priority DESC, scheduled_for ASC`.
    fn find_due(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Task>, FunnelError>> + Send;

    /// Atomically move a task from `pending` to `in_progress`.
    ///
    /// Returns `false` when the task was no longer pending.
    fn claim(
        &self,
        id: TaskId,
        started_at: Timestamp,
    ) -> impl Future<Output = Result<bool, FunnelError>> + Send;

    /// Store the outcome of an `in_progress` task and move it to the
    /// terminal status the result maps to.
    fn complete(
        &self,
        id: TaskId,
        result: TaskResult,
        completed_at: Timestamp,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send;

    /// Delete a task unless it is `in_progress`.
    ///
    /// Returns `false` when nothing was deleted.
    fn delete(&self, id: TaskId) -> impl Future<Output = Result<bool, FunnelError>> + Send;
}
