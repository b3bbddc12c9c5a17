//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`FunnelError`] via `From`, so callers only ever match on one enum.

use std::error::Error as StdError;

/// Top-level error returned by domain operations, services and ports.
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("storage error: {0}")]
    Storage(Box<dyn StdError + Send + Sync>),

    #[error("integration error: {0}")]
    Integration(Box<dyn StdError + Send + Sync>),
}

impl FunnelError {
    /// Wrap a collaborator failure (mailer, webhook, converter, …).
    pub fn integration(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Integration(err.into())
    }
}

/// Invariant violations detected while building or mutating domain objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("automation must declare at least one action")]
    NoActions,

    #[error("automation must declare a trigger")]
    MissingTrigger,

    #[error("unknown trigger type '{0}'")]
    UnknownTriggerType(String),

    #[error("scheduled trigger requires a schedule")]
    MissingSchedule,

    #[error("task type must not be empty")]
    EmptyTaskType,

    #[error("priority {0} is outside the 1..=5 range")]
    PriorityOutOfRange(i64),

    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("weekly schedule requires a day of week between 0 and 6")]
    InvalidDayOfWeek,

    #[error("monthly schedule requires a day of month between 1 and 31")]
    InvalidDayOfMonth,

    #[error("operator '{0}' requires a list value")]
    ListValueRequired(&'static str),

    #[error("invalid field path '{0}'")]
    InvalidFieldPath(String),

    #[error("field '{field}' cannot hold {value}")]
    FieldType { field: String, value: &'static str },

    #[error("convert_lead requires a trigger scoped to leads")]
    ConvertRequiresLead,

    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    #[error("unknown record kind '{0}'")]
    UnknownRecordKind(String),

    #[error("invalid identifier '{0}'")]
    InvalidId(String),

    #[error("page and limit must be positive")]
    InvalidPage,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} '{id}' not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An operation is not allowed in the current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("cannot move task from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("task '{0}' is in progress and cannot be deleted")]
    TaskInProgress(String),

    #[error("record '{0}' is not a lead")]
    NotALead(String),

    #[error("lead '{0}' was already converted")]
    AlreadyConverted(String),
}
