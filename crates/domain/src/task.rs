//! Task — a unit of deferred work processed by the dispatcher.
//!
//! Status only ever moves `pending → in_progress → {completed | failed}`.
//! Terminal states are final; nothing in the system retries a task.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, FunnelError, ValidationError};
use crate::id::{OwnerId, TaskId};
use crate::time::Timestamp;

/// Opaque key/value payload handed to the task handler.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows `self → next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Urgency from 1 (lowest) to 5 (most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Self = Self(1);
    pub const NORMAL: Self = Self(3);
    pub const HIGHEST: Self = Self(5);

    /// # Errors
    ///
    /// Returns [`ValidationError::PriorityOutOfRange`] outside `1..=5`.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(ValidationError::PriorityOutOfRange(value)),
        }
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<i64> for Priority {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

/// Outcome stored on a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Terminal status this result maps to.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        if self.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        }
    }
}

/// A persisted unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub payload: Payload,
    pub result: Option<TaskResult>,
    pub scheduled_for: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Task {
    /// Create a builder for constructing a [`Task`].
    #[must_use]
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTaskType`] when `task_type` is blank.
    pub fn validate(&self) -> Result<(), FunnelError> {
        if self.task_type.trim().is_empty() {
            return Err(ValidationError::EmptyTaskType.into());
        }
        Ok(())
    }

    /// Whether the dispatcher may pick this task at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == TaskStatus::Pending && self.scheduled_for <= now
    }

    /// Move `pending → in_progress`.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::IllegalTransition`] from any other state.
    pub fn start(&mut self, now: Timestamp) -> Result<(), FunnelError> {
        self.transition(TaskStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Move `in_progress → completed | failed` according to `result`.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::IllegalTransition`] unless the task is in progress.
    pub fn finish(&mut self, result: TaskResult, now: Timestamp) -> Result<(), FunnelError> {
        self.transition(result.status())?;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Check that the task can be removed from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::TaskInProgress`] while the task is running.
    pub fn ensure_deletable(&self) -> Result<(), FunnelError> {
        if self.status == TaskStatus::InProgress {
            return Err(ConflictError::TaskInProgress(self.id.to_string()).into());
        }
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), FunnelError> {
        if !self.status.can_transition_to(next) {
            return Err(ConflictError::IllegalTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            }
            .into());
        }
        self.status = next;
        Ok(())
    }
}

/// Step-by-step builder for [`Task`].
#[derive(Debug, Default)]
pub struct TaskBuilder {
    id: Option<TaskId>,
    owner_id: Option<OwnerId>,
    task_type: Option<String>,
    priority: Option<Priority>,
    payload: Payload,
    scheduled_for: Option<Timestamp>,
    created_at: Option<Timestamp>,
}

impl TaskBuilder {
    #[must_use]
    pub fn id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner_id(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn scheduled_for(mut self, ts: Timestamp) -> Self {
        self.scheduled_for = Some(ts);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a pending [`Task`].
    ///
    /// `created_at` defaults to the current time and `scheduled_for` to
    /// `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Validation`] if the task type is blank.
    pub fn build(self) -> Result<Task, FunnelError> {
        let created_at = self.created_at.unwrap_or_else(crate::time::now);
        let task = Task {
            id: self.id.unwrap_or_default(),
            owner_id: self.owner_id.unwrap_or_default(),
            task_type: self.task_type.unwrap_or_default(),
            status: TaskStatus::Pending,
            priority: self.priority.unwrap_or_default(),
            payload: self.payload,
            result: None,
            scheduled_for: self.scheduled_for.unwrap_or(created_at),
            started_at: None,
            completed_at: None,
            created_at,
        };
        task.validate()?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_task() -> Task {
        Task::builder()
            .owner_id(OwnerId::new())
            .task_type("generate_content")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_pending_task_with_normal_priority() {
        let task = pending_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::NORMAL);
        assert_eq!(task.scheduled_for, task.created_at);
        assert!(task.result.is_none());
    }

    #[test]
    fn should_reject_blank_task_type() {
        let result = Task::builder().task_type("  ").build();
        assert!(matches!(
            result,
            Err(FunnelError::Validation(ValidationError::EmptyTaskType))
        ));
    }

    #[test]
    fn should_reject_priority_outside_range() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert!(Priority::new(-1).is_err());
        assert_eq!(Priority::new(5).unwrap(), Priority::HIGHEST);
    }

    #[test]
    fn should_reject_out_of_range_priority_in_json() {
        let result: Result<Priority, _> = serde_json::from_str("9");
        assert!(result.is_err());
        let ok: Priority = serde_json::from_str("2").unwrap();
        assert_eq!(ok.get(), 2);
    }

    #[test]
    fn should_follow_pending_in_progress_completed_path() {
        let mut task = pending_task();
        let now = crate::time::now();
        task.start(now).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.started_at, Some(now));

        task.finish(TaskResult::ok("done"), now).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(now));
    }

    #[test]
    fn should_mark_failed_when_result_is_unsuccessful() {
        let mut task = pending_task();
        let now = crate::time::now();
        task.start(now).unwrap();
        task.finish(TaskResult::failure("quota exceeded"), now)
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.result.unwrap().error.as_deref(),
            Some("quota exceeded")
        );
    }

    #[test]
    fn should_refuse_to_leave_terminal_state() {
        let mut task = pending_task();
        let now = crate::time::now();
        task.start(now).unwrap();
        task.finish(TaskResult::ok("done"), now).unwrap();

        assert!(matches!(
            task.start(now),
            Err(FunnelError::Conflict(ConflictError::IllegalTransition { .. }))
        ));
        assert!(task.finish(TaskResult::failure("late"), now).is_err());
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn should_refuse_to_finish_pending_task() {
        let mut task = pending_task();
        assert!(task.finish(TaskResult::ok("skip"), crate::time::now()).is_err());
    }

    #[test]
    fn should_only_forbid_deleting_in_progress_tasks() {
        let mut task = pending_task();
        assert!(task.ensure_deletable().is_ok());
        task.start(crate::time::now()).unwrap();
        assert!(matches!(
            task.ensure_deletable(),
            Err(FunnelError::Conflict(ConflictError::TaskInProgress(_)))
        ));
    }

    #[test]
    fn should_be_due_only_when_pending_and_scheduled_in_past() {
        let now = crate::time::now();
        let task = Task::builder()
            .task_type("x")
            .scheduled_for(now + chrono::Duration::minutes(5))
            .build()
            .unwrap();
        assert!(!task.is_due(now));
        assert!(task.is_due(now + chrono::Duration::minutes(5)));
    }

    #[test]
    fn should_serialize_type_and_status_in_wire_format() {
        let task = pending_task();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "generate_content");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], 3);
    }
}
