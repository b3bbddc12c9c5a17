//! Action — the effect performed when an automation fires.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::FieldPath;
use crate::task::{Payload, Priority};
use crate::value::Value;

/// Prefix of the task type used for delayed actions.
pub const DEFERRED_TASK_PREFIX: &str = "automation.";

/// What an action does, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "params",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ActionKind {
    /// Set a field to a literal value.
    UpdateField { field: String, value: Value },
    AddTag { tags: Vec<String> },
    RemoveTag { tags: Vec<String> },
    /// Send a templated email through the mailer.
    SendEmail { template_id: String },
    /// Enqueue a task, scheduled now.
    CreateTask {
        task_type: String,
        #[serde(default)]
        payload: Payload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
    },
    /// Turn the lead into a contact.
    ConvertLead,
    /// Deliver the params, unmodified, to an external URL.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default)]
        payload: Payload,
    },
}

impl ActionKind {
    /// Every action type, in declaration order.
    pub const TYPE_NAMES: [&'static str; 7] = [
        "update_field",
        "add_tag",
        "remove_tag",
        "send_email",
        "create_task",
        "convert_lead",
        "webhook",
    ];

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UpdateField { .. } => "update_field",
            Self::AddTag { .. } => "add_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::SendEmail { .. } => "send_email",
            Self::CreateTask { .. } => "create_task",
            Self::ConvertLead => "convert_lead",
            Self::Webhook { .. } => "webhook",
        }
    }
}

/// One step of an automation: an [`ActionKind`] plus an optional delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAction")]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Minutes to wait before running; `0` runs inline.
    #[serde(default)]
    pub delay_minutes: u32,
}

impl Action {
    #[must_use]
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            delay_minutes: 0,
        }
    }

    #[must_use]
    pub fn delayed(mut self, minutes: u32) -> Self {
        self.delay_minutes = minutes;
        self
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.delay_minutes > 0
    }

    /// Task type used when this action is deferred, e.g. `automation.add_tag`.
    #[must_use]
    pub fn deferred_task_type(&self) -> String {
        format!("{DEFERRED_TASK_PREFIX}{}", self.type_name())
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFieldPath`] when `update_field`
    /// targets a path that does not resolve, or
    /// [`ValidationError::EmptyTaskType`] for a blank `create_task` type.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.kind {
            ActionKind::UpdateField { field, .. } if FieldPath::parse(field).is_none() => {
                Err(ValidationError::InvalidFieldPath(field.clone()))
            }
            ActionKind::CreateTask { task_type, .. } if task_type.trim().is_empty() => {
                Err(ValidationError::EmptyTaskType)
            }
            _ => Ok(()),
        }
    }
}

/// Wire shape accepted on input; `params` may be omitted for `convert_lead`.
///
/// The delay is read from the top level or from `params.delayMinutes`; when
/// both are present the larger one wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    params: serde_json::Value,
    #[serde(default)]
    delay_minutes: u32,
}

impl TryFrom<RawAction> for Action {
    type Error = serde_json::Error;

    fn try_from(mut raw: RawAction) -> Result<Self, Self::Error> {
        let params_delay = match raw
            .params
            .as_object_mut()
            .and_then(|params| params.remove("delayMinutes"))
        {
            Some(delay) => serde_json::from_value::<u32>(delay)?,
            None => 0,
        };
        let kind = if raw.action_type == "convert_lead" {
            ActionKind::ConvertLead
        } else {
            serde_json::from_value(serde_json::json!({
                "type": raw.action_type,
                "params": raw.params,
            }))?
        };
        Ok(Self {
            kind,
            delay_minutes: raw.delay_minutes.max(params_delay),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::UpdateField { field, value } => write!(f, "update_field({field} = {value})")?,
            ActionKind::AddTag { tags } => write!(f, "add_tag({})", tags.join(", "))?,
            ActionKind::RemoveTag { tags } => write!(f, "remove_tag({})", tags.join(", "))?,
            ActionKind::SendEmail { template_id } => write!(f, "send_email({template_id})")?,
            ActionKind::CreateTask { task_type, .. } => write!(f, "create_task({task_type})")?,
            ActionKind::ConvertLead => f.write_str("convert_lead")?,
            ActionKind::Webhook { url, .. } => write!(f, "webhook({url})")?,
        }
        if self.is_delayed() {
            write!(f, " after {}m", self.delay_minutes)?;
        }
        Ok(())
    }
}
