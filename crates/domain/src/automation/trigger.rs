//! Trigger — the event or schedule that activates an automation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::RecordKind;
use crate::time::{CalendarSlot, Timestamp};

/// Record lifecycle events an automation can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    NewLead,
    NewContact,
    LeadUpdated,
    ContactUpdated,
    TagAdded,
    TagRemoved,
}

impl TriggerEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::NewContact => "new_contact",
            Self::LeadUpdated => "lead_updated",
            Self::ContactUpdated => "contact_updated",
            Self::TagAdded => "tag_added",
            Self::TagRemoved => "tag_removed",
        }
    }

    /// The creation event for a record kind.
    #[must_use]
    pub fn created(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Lead => Self::NewLead,
            RecordKind::Contact => Self::NewContact,
        }
    }

    /// The update event for a record kind.
    #[must_use]
    pub fn updated(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Lead => Self::LeadUpdated,
            RecordKind::Contact => Self::ContactUpdated,
        }
    }
}

impl FromStr for TriggerEvent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_lead" => Ok(Self::NewLead),
            "new_contact" => Ok(Self::NewContact),
            "lead_updated" => Ok(Self::LeadUpdated),
            "contact_updated" => Ok(Self::ContactUpdated),
            "tag_added" => Ok(Self::TagAdded),
            "tag_removed" => Ok(Self::TagRemoved),
            other => Err(ValidationError::UnknownTriggerType(other.to_string())),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which record kinds a trigger applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityScope {
    #[default]
    Lead,
    Contact,
    Both,
}

impl EntityScope {
    #[must_use]
    pub fn includes(self, kind: RecordKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Lead, RecordKind::Lead) | (Self::Contact, RecordKind::Contact)
        )
    }

    /// Kind filter for a store query; `None` means every kind.
    #[must_use]
    pub fn kind(self) -> Option<RecordKind> {
        match self {
            Self::Lead => Some(RecordKind::Lead),
            Self::Contact => Some(RecordKind::Contact),
            Self::Both => None,
        }
    }
}

/// How often a scheduled automation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// A validated `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// When a scheduled automation fires.
///
/// Matching is at hour granularity: the minute part of `time` is kept for
/// display but the sweeper fires each matching schedule once per hour slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub frequency: Frequency,
    /// 0 = Sunday … 6 = Saturday; required for weekly schedules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    /// 1 ..= 31; required for monthly schedules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    pub time: TimeOfDay,
}

impl Schedule {
    /// Check that the day fields fit the frequency.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDayOfWeek`] or
    /// [`ValidationError::InvalidDayOfMonth`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.frequency {
            Frequency::Daily => Ok(()),
            Frequency::Weekly => match self.day_of_week {
                Some(0..=6) => Ok(()),
                _ => Err(ValidationError::InvalidDayOfWeek),
            },
            Frequency::Monthly => match self.day_of_month {
                Some(1..=31) => Ok(()),
                _ => Err(ValidationError::InvalidDayOfMonth),
            },
        }
    }

    /// Whether the schedule is due in the hour containing `now` (UTC).
    #[must_use]
    pub fn matches(&self, now: Timestamp) -> bool {
        let slot = CalendarSlot::of(now);
        if slot.hour != self.time.hour {
            return false;
        }
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly => self.day_of_week == Some(slot.day_of_week),
            Frequency::Monthly => self.day_of_month == Some(slot.day_of_month),
        }
    }
}

/// What makes an automation eligible to run.
///
/// Serialized as `{"type": "event", "event": "new_lead", ...}`. Input also
/// accepts the flat form where `type` is the event name itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Trigger {
    /// A record lifecycle event.
    Event {
        event: TriggerEvent,
        #[serde(default)]
        entity_type: EntityScope,
    },
    /// A periodic schedule; conditions act as a query over the owner's records.
    Scheduled {
        #[serde(default)]
        entity_type: EntityScope,
        schedule: Schedule,
    },
}

/// Wire shape accepted on input.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrigger {
    #[serde(rename = "type")]
    trigger_type: String,
    #[serde(default)]
    event: Option<TriggerEvent>,
    #[serde(default)]
    entity_type: EntityScope,
    #[serde(default)]
    schedule: Option<Schedule>,
}

impl TryFrom<RawTrigger> for Trigger {
    type Error = ValidationError;

    fn try_from(raw: RawTrigger) -> Result<Self, Self::Error> {
        let entity_type = raw.entity_type;
        match raw.trigger_type.as_str() {
            "scheduled" => {
                let schedule = raw.schedule.ok_or(ValidationError::MissingSchedule)?;
                Ok(Self::Scheduled {
                    entity_type,
                    schedule,
                })
            }
            "event" => {
                let event = raw.event.ok_or(ValidationError::MissingTrigger)?;
                Ok(Self::Event { event, entity_type })
            }
            other => {
                let event = other.parse()?;
                Ok(Self::Event { event, entity_type })
            }
        }
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTrigger::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl Trigger {
    #[must_use]
    pub fn entity_scope(&self) -> EntityScope {
        match self {
            Self::Event { entity_type, .. } | Self::Scheduled { entity_type, .. } => *entity_type,
        }
    }

    /// Wire name of the trigger type: the event name or `"scheduled"`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Event { event, .. } => event.as_str(),
            Self::Scheduled { .. } => "scheduled",
        }
    }

    /// Event path: `event` on a record of `kind`.
    #[must_use]
    pub fn matches_event(&self, event: TriggerEvent, kind: RecordKind) -> bool {
        match self {
            Self::Event {
                event: expected,
                entity_type,
            } => *expected == event && entity_type.includes(kind),
            Self::Scheduled { .. } => false,
        }
    }

    /// Schedule path: due in the hour containing `now`.
    #[must_use]
    pub fn matches_schedule(&self, now: Timestamp) -> bool {
        match self {
            Self::Scheduled { schedule, .. } => schedule.matches(now),
            Self::Event { .. } => false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { event, .. } => write!(f, "event({event})"),
            Self::Scheduled { schedule, .. } => {
                write!(f, "scheduled({:?} at {})", schedule.frequency, schedule.time)
            }
        }
    }
}
