//! Task service — use-cases for enqueueing and inspecting tasks.

use std::sync::Arc;

use funnelhub_domain::error::{ConflictError, FunnelError, NotFoundError};
use funnelhub_domain::id::{OwnerId, TaskId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::task::{Payload, Priority, Task};
use funnelhub_domain::time::Timestamp;

use crate::clock::Clock;
use crate::ports::{TaskQuery, TaskRepository};

/// Input for [`TaskService::enqueue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub task_type: String,
    pub payload: Payload,
    /// `1..=5`; defaults to 3.
    pub priority: Option<i64>,
    /// Defaults to now.
    pub scheduled_for: Option<Timestamp>,
}

/// Application service for the task queue.
pub struct TaskService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R: TaskRepository> TaskService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Add a pending task to the queue.
    ///
    /// The task type is not checked against registered handlers; an unknown
    /// type fails when the dispatcher picks it up.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Validation`] for a blank type or an
    /// out-of-range priority, or a storage error from the repository.
    #[tracing::instrument(skip(self, new_task), fields(task_type = %new_task.task_type))]
    pub async fn enqueue(&self, owner_id: OwnerId, new_task: NewTask) -> Result<Task, FunnelError> {
        let priority = new_task
            .priority
            .map(Priority::new)
            .transpose()?
            .unwrap_or_default();
        let now = self.clock.now();
        let task = Task::builder()
            .owner_id(owner_id)
            .task_type(new_task.task_type)
            .priority(priority)
            .payload(new_task.payload)
            .scheduled_for(new_task.scheduled_for.unwrap_or(now))
            .created_at(now)
            .build()?;
        let task = self.repo.create(task).await?;
        tracing::info!(task_id = %task.id, scheduled_for = %task.scheduled_for, "task enqueued");
        Ok(task)
    }

    /// Look up a task of `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] when the task does not exist or
    /// belongs to another owner, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner_id: OwnerId, id: TaskId) -> Result<Task, FunnelError> {
        self.repo
            .get_by_id(id)
            .await?
            .filter(|task| task.owner_id == owner_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Task",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// One page of tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, query: TaskQuery) -> Result<Paginated<Task>, FunnelError> {
        self.repo.list(query).await
    }

    /// Delete a task that is not running.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown tasks,
    /// [`FunnelError::Conflict`] while the task is in progress (including
    /// when it was claimed between the lookup and the delete), or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner_id: OwnerId, id: TaskId) -> Result<(), FunnelError> {
        let task = self.get(owner_id, id).await?;
        task.ensure_deletable()?;
        if !self.repo.delete(id).await? {
            return Err(ConflictError::TaskInProgress(id.to_string()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::InMemoryTaskRepo;
    use chrono::{Duration, TimeZone, Utc};
    use funnelhub_domain::error::ValidationError;
    use funnelhub_domain::page::Page;
    use funnelhub_domain::task::TaskStatus;

    fn service() -> (TaskService<InMemoryTaskRepo>, InMemoryTaskRepo, Arc<ManualClock>) {
        let repo = InMemoryTaskRepo::default();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        (TaskService::new(repo.clone(), clock.clone()), repo, clock)
    }

    fn new_task(task_type: &str) -> NewTask {
        NewTask {
            task_type: task_type.to_string(),
            ..NewTask::default()
        }
    }

    #[tokio::test]
    async fn should_enqueue_pending_task_with_defaults() {
        let (svc, _, clock) = service();
        let owner = OwnerId::new();

        let task = svc.enqueue(owner, new_task("send_email")).await.unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::NORMAL);
        assert_eq!(task.scheduled_for, clock.now());
        assert_eq!(task.owner_id, owner);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn should_reject_out_of_range_priority() {
        let (svc, repo, _) = service();
        let err = svc
            .enqueue(
                OwnerId::new(),
                NewTask {
                    priority: Some(6),
                    ..new_task("x")
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FunnelError::Validation(ValidationError::PriorityOutOfRange(6))
        ));
        assert!(repo.all().is_empty());
    }

    #[tokio::test]
    async fn should_reject_blank_task_type() {
        let (svc, _, _) = service();
        let err = svc.enqueue(OwnerId::new(), new_task(" ")).await.unwrap_err();
        assert!(matches!(
            err,
            FunnelError::Validation(ValidationError::EmptyTaskType)
        ));
    }

    #[tokio::test]
    async fn should_hide_tasks_of_other_owners() {
        let (svc, _, _) = service();
        let task = svc.enqueue(OwnerId::new(), new_task("x")).await.unwrap();

        let err = svc.get(OwnerId::new(), task.id).await.unwrap_err();

        assert!(matches!(err, FunnelError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_list_newest_first_with_filters() {
        let (svc, _, clock) = service();
        let owner = OwnerId::new();
        let first = svc.enqueue(owner, new_task("a")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let second = svc.enqueue(owner, new_task("b")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let third = svc.enqueue(owner, new_task("a")).await.unwrap();
        svc.enqueue(OwnerId::new(), new_task("a")).await.unwrap();

        let all = svc.list(TaskQuery::for_owner(owner)).await.unwrap();
        let only_a = svc
            .list(TaskQuery {
                task_type: Some("a".into()),
                ..TaskQuery::for_owner(owner)
            })
            .await
            .unwrap();
        let paged = svc
            .list(TaskQuery {
                page: Page::new(Some(2), Some(2)).unwrap(),
                ..TaskQuery::for_owner(owner)
            })
            .await
            .unwrap();

        assert_eq!(
            all.items.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![third.id, second.id, first.id]
        );
        assert_eq!(only_a.total, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].id, first.id);
        assert_eq!(paged.total, 3);
    }

    #[tokio::test]
    async fn should_delete_pending_task() {
        let (svc, repo, _) = service();
        let owner = OwnerId::new();
        let task = svc.enqueue(owner, new_task("x")).await.unwrap();

        svc.delete(owner, task.id).await.unwrap();

        assert!(repo.all().is_empty());
    }

    #[tokio::test]
    async fn should_refuse_to_delete_task_in_progress() {
        let (svc, repo, clock) = service();
        let owner = OwnerId::new();
        let task = svc.enqueue(owner, new_task("x")).await.unwrap();
        repo.claim(task.id, clock.now()).await.unwrap();

        let err = svc.delete(owner, task.id).await.unwrap_err();

        assert!(matches!(
            err,
            FunnelError::Conflict(ConflictError::TaskInProgress(_))
        ));
        assert_eq!(repo.get(task.id).status, TaskStatus::InProgress);
    }
}
