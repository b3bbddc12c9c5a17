//! Automation — trigger → condition → action rules over records.
//!
//! Each automation has a [`Trigger`] that decides when it is considered,
//! zero or more [`Condition`]s that must all hold for the record, and one or
//! more [`Action`]s applied in declared order.

mod action;
mod condition;
mod trigger;

pub use action::{Action, ActionKind, DEFERRED_TASK_PREFIX};
pub use condition::{Condition, Operator, evaluate};
pub use trigger::{EntityScope, Frequency, Schedule, TimeOfDay, Trigger, TriggerEvent};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FunnelError, ValidationError};
use crate::id::{AutomationId, OwnerId};
use crate::time::{Timestamp, now};

/// Whether the runtime considers an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    #[default]
    Draft,
    Active,
    Paused,
}

impl AutomationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Execution counters, updated once per trigger-match-and-act cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStats {
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_executed: Option<Timestamp>,
}

impl AutomationStats {
    /// Count one cycle. `success` means every action succeeded.
    pub fn record(&mut self, success: bool, at: Timestamp) {
        self.execution_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.last_executed = Some(at);
    }
}

/// A rule that reacts to record events or schedules by executing actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    pub id: AutomationId,
    pub owner_id: OwnerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: AutomationStatus,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub stats: AutomationStats,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `actions` is empty ([`ValidationError::NoActions`])
    /// - the schedule, a condition or an action is malformed
    /// - `convert_lead` is used outside a lead-scoped trigger
    ///   ([`ValidationError::ConvertRequiresLead`])
    pub fn validate(&self) -> Result<(), FunnelError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        if let Trigger::Scheduled { schedule, .. } = &self.trigger {
            schedule.validate()?;
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        for action in &self.actions {
            action.validate()?;
            if action.kind == ActionKind::ConvertLead
                && self.trigger.entity_scope() != EntityScope::Lead
            {
                return Err(ValidationError::ConvertRequiresLead.into());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AutomationStatus::Active
    }

    pub fn activate(&mut self, now: Timestamp) {
        self.status = AutomationStatus::Active;
        self.updated_at = now;
    }

    pub fn pause(&mut self, now: Timestamp) {
        self.status = AutomationStatus::Paused;
        self.updated_at = now;
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    owner_id: Option<OwnerId>,
    name: Option<String>,
    description: Option<String>,
    status: Option<AutomationStatus>,
    trigger: Option<Trigger>,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    stats: AutomationStats,
    created_at: Option<Timestamp>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner_id(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: AutomationStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    #[must_use]
    pub fn stats(mut self, stats: AutomationStats) -> Self {
        self.stats = stats;
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingTrigger`] without a trigger, and
    /// whatever [`Automation::validate`] reports.
    pub fn build(self) -> Result<Automation, FunnelError> {
        let trigger = self.trigger.ok_or(ValidationError::MissingTrigger)?;
        let created_at = self.created_at.unwrap_or_else(now);
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            owner_id: self.owner_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            status: self.status.unwrap_or_default(),
            trigger,
            conditions: self.conditions,
            actions: self.actions,
            stats: self.stats,
            created_at,
            updated_at: created_at,
        };
        automation.validate()?;
        Ok(automation)
    }
}
