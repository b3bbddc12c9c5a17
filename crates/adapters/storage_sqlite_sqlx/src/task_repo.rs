//! `SQLite` implementation of [`TaskRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use funnelhub_app::ports::{TaskQuery, TaskRepository};
use funnelhub_domain::error::{ConflictError, FunnelError};
use funnelhub_domain::id::{OwnerId, TaskId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::task::{Priority, Task, TaskResult, TaskStatus};
use funnelhub_domain::time::Timestamp;

use crate::columns::{
    decode, parse_json, parse_optional_timestamp, parse_timestamp, timestamp, total, window,
};
use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Task);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let owner_id: uuid::Uuid = row.try_get("owner_id")?;
        let status: String = row.try_get("status")?;
        let priority: i64 = row.try_get("priority")?;
        let payload: String = row.try_get("payload")?;
        let result: Option<String> = row.try_get("result")?;
        let scheduled_for: String = row.try_get("scheduled_for")?;
        let started_at: Option<String> = row.try_get("started_at")?;
        let completed_at: Option<String> = row.try_get("completed_at")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(Task {
            id: TaskId::from_uuid(id),
            owner_id: OwnerId::from_uuid(owner_id),
            task_type: row.try_get("task_type")?,
            status: decode(status.parse::<TaskStatus>())?,
            priority: decode(Priority::try_from(priority))?,
            payload: parse_json(&payload)?,
            result: result.as_deref().map(parse_json).transpose()?,
            scheduled_for: parse_timestamp(&scheduled_for)?,
            started_at: parse_optional_timestamp(started_at.as_deref())?,
            completed_at: parse_optional_timestamp(completed_at.as_deref())?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO tasks (id, owner_id, task_type, status, priority, payload, result,
                       scheduled_for, started_at, completed_at, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM tasks WHERE id = ?";

const FILTER: &str = r"
    WHERE owner_id = ?1
      AND (?2 IS NULL OR status = ?2)
      AND (?3 IS NULL OR task_type = ?3)
";

const SELECT_DUE: &str = r"
    SELECT * FROM tasks
    WHERE status = 'pending' AND scheduled_for <= ?
    ORDER BY priority DESC, scheduled_for ASC
    LIMIT ?
";

const CLAIM: &str = r"
    UPDATE tasks SET status = 'in_progress', started_at = ?
    WHERE id = ? AND status = 'pending'
";

const COMPLETE: &str = r"
    UPDATE tasks SET status = ?, result = ?, completed_at = ?
    WHERE id = ? AND status = 'in_progress'
";

const DELETE: &str = "DELETE FROM tasks WHERE id = ? AND status != 'in_progress'";

/// `SQLite`-backed task queue.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: Task) -> Result<Task, FunnelError> {
        let payload = serde_json::to_string(&task.payload).map_err(StorageError::from)?;
        let result = task
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(task.id.as_uuid())
            .bind(task.owner_id.as_uuid())
            .bind(&task.task_type)
            .bind(task.status.as_str())
            .bind(i64::from(task.priority.get()))
            .bind(&payload)
            .bind(&result)
            .bind(timestamp(task.scheduled_for))
            .bind(task.started_at.map(timestamp))
            .bind(task.completed_at.map(timestamp))
            .bind(timestamp(task.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(task)
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, FunnelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn list(&self, query: TaskQuery) -> Result<Paginated<Task>, FunnelError> {
        let status = query.status.map(TaskStatus::as_str);
        let (limit, offset) = window(query.page);

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tasks {FILTER}"))
            .bind(query.owner_id.as_uuid())
            .bind(status)
            .bind(query.task_type.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let rows: Vec<Wrapper> = sqlx::query_as(&format!(
            "SELECT * FROM tasks {FILTER} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5"
        ))
        .bind(query.owner_id.as_uuid())
        .bind(status)
        .bind(query.task_type.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(Paginated::new(
            rows.into_iter().map(|w| w.0).collect(),
            total(count),
            query.page,
        ))
    }

    async fn find_due(&self, now: Timestamp, limit: u32) -> Result<Vec<Task>, FunnelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_DUE)
            .bind(timestamp(now))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn claim(&self, id: TaskId, started_at: Timestamp) -> Result<bool, FunnelError> {
        let done = sqlx::query(CLAIM)
            .bind(timestamp(started_at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(done.rows_affected() == 1)
    }

    async fn complete(
        &self,
        id: TaskId,
        result: TaskResult,
        completed_at: Timestamp,
    ) -> Result<(), FunnelError> {
        let status = result.status();
        let result_json = serde_json::to_string(&result).map_err(StorageError::from)?;

        let done = sqlx::query(COMPLETE)
            .bind(status.as_str())
            .bind(&result_json)
            .bind(timestamp(completed_at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if done.rows_affected() == 0
            && let Some(task) = self.get_by_id(id).await?
        {
            return Err(ConflictError::IllegalTransition {
                from: task.status.as_str(),
                to: status.as_str(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, FunnelError> {
        let done = sqlx::query(DELETE)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(done.rows_affected() == 1)
    }
}
