//! Event — a record lifecycle change that automations react to.

use serde::{Deserialize, Serialize};

use crate::automation::TriggerEvent;
use crate::record::Record;

/// A record mutation, carrying the record as it is after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub event: TriggerEvent,
    pub record: Record,
}

impl RecordEvent {
    #[must_use]
    pub fn new(event: TriggerEvent, record: Record) -> Self {
        Self { event, record }
    }

    /// `new_lead` / `new_contact` for a freshly created record.
    #[must_use]
    pub fn created(record: Record) -> Self {
        Self::new(TriggerEvent::created(record.kind()), record)
    }

    /// `lead_updated` / `contact_updated` for a changed record.
    #[must_use]
    pub fn updated(record: Record) -> Self {
        Self::new(TriggerEvent::updated(record.kind()), record)
    }
}
