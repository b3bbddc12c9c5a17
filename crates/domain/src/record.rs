//! Records — the leads and contacts that automations observe and mutate.
//!
//! A [`Record`] is a tagged union over the two known entity shapes. Field
//! access goes through [`FieldPath`], which only resolves names the schema
//! knows about plus one level into `customFields`. Anything else resolves to
//! *missing*, never to an error, so condition evaluation stays total.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, FunnelError, ValidationError};
use crate::id::{OwnerId, RecordId};
use crate::time::Timestamp;
use crate::value::Value;

/// Which shape a record has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Lead,
    Contact,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Contact => "contact",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(Self::Lead),
            "contact" => Ok(Self::Contact),
            other => Err(ValidationError::UnknownRecordKind(other.to_string())),
        }
    }
}

/// A timeline entry appended by automation actions (e.g. an email was sent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub kind: String,
    pub description: String,
    pub at: Timestamp,
}

/// Fields shared by leads and contacts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
}

/// A prospect that has not been converted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: RecordId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub converted_to: Option<RecordId>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An established relationship, possibly converted from a [`Lead`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: RecordId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub converted_from: Option<RecordId>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Lead {
    /// Create an empty lead for `owner` stamped at `now`.
    #[must_use]
    pub fn new(owner_id: OwnerId, profile: Profile, now: Timestamp) -> Self {
        Self {
            id: RecordId::new(),
            owner_id,
            profile,
            converted_to: None,
            activities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Produce the contact this lead becomes, and mark the lead converted.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::AlreadyConverted`] when the lead already
    /// points at a contact.
    pub fn convert(&mut self, now: Timestamp) -> Result<Contact, FunnelError> {
        if self.converted_to.is_some() {
            return Err(ConflictError::AlreadyConverted(self.id.to_string()).into());
        }
        let contact = Contact {
            id: RecordId::new(),
            owner_id: self.owner_id,
            profile: Profile {
                status: Some("active".to_string()),
                ..self.profile.clone()
            },
            job_title: None,
            converted_from: Some(self.id),
            activities: self.activities.clone(),
            created_at: now,
            updated_at: now,
        };
        self.converted_to = Some(contact.id);
        self.profile.status = Some("converted".to_string());
        self.updated_at = now;
        Ok(contact)
    }
}

impl Contact {
    /// Create an empty contact for `owner` stamped at `now`.
    #[must_use]
    pub fn new(owner_id: OwnerId, profile: Profile, now: Timestamp) -> Self {
        Self {
            id: RecordId::new(),
            owner_id,
            profile,
            job_title: None,
            converted_from: None,
            activities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lead or contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Lead(Lead),
    Contact(Contact),
}

/// A resolved field location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    FirstName,
    LastName,
    Email,
    Phone,
    Company,
    Source,
    Status,
    Score,
    Tags,
    JobTitle,
    /// `customFields.<key>`
    Custom(String),
}

impl FieldPath {
    /// Resolve a dotted path. Returns `None` for unknown names, empty
    /// segments and anything nested deeper than one level.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let child = segments.next();
        if segments.next().is_some() {
            return None;
        }
        match (head, child) {
            ("customFields" | "custom_fields", Some(key)) if !key.is_empty() => {
                Some(Self::Custom(key.to_string()))
            }
            (_, Some(_)) => None,
            ("firstName" | "first_name", None) => Some(Self::FirstName),
            ("lastName" | "last_name", None) => Some(Self::LastName),
            ("email", None) => Some(Self::Email),
            ("phone", None) => Some(Self::Phone),
            ("company", None) => Some(Self::Company),
            ("source", None) => Some(Self::Source),
            ("status", None) => Some(Self::Status),
            ("score", None) => Some(Self::Score),
            ("tags", None) => Some(Self::Tags),
            ("jobTitle" | "job_title", None) => Some(Self::JobTitle),
            _ => None,
        }
    }
}

fn text(value: Option<&String>) -> Option<Value> {
    value.map(|s| Value::String(s.clone()))
}

fn set_text(slot: &mut Option<String>, field: &str, value: Value) -> Result<(), ValidationError> {
    match value {
        Value::Null => *slot = None,
        Value::String(s) => *slot = Some(s),
        Value::Number(_) | Value::Bool(_) => *slot = value.scalar_key(),
        Value::List(_) => {
            return Err(ValidationError::FieldType {
                field: field.to_string(),
                value: value.kind(),
            });
        }
    }
    Ok(())
}

impl Record {
    #[must_use]
    pub fn id(&self) -> RecordId {
        match self {
            Self::Lead(lead) => lead.id,
            Self::Contact(contact) => contact.id,
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> OwnerId {
        match self {
            Self::Lead(lead) => lead.owner_id,
            Self::Contact(contact) => contact.owner_id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Lead(_) => RecordKind::Lead,
            Self::Contact(_) => RecordKind::Contact,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        match self {
            Self::Lead(lead) => &lead.profile,
            Self::Contact(contact) => &contact.profile,
        }
    }

    fn profile_mut(&mut self) -> &mut Profile {
        match self {
            Self::Lead(lead) => &mut lead.profile,
            Self::Contact(contact) => &mut contact.profile,
        }
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.profile().tags
    }

    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        match self {
            Self::Lead(lead) => lead.updated_at,
            Self::Contact(contact) => contact.updated_at,
        }
    }

    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        match self {
            Self::Lead(lead) => lead.created_at,
            Self::Contact(contact) => contact.created_at,
        }
    }

    /// Read a field by dotted path. Unknown paths and unset fields are `None`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.get_field(&FieldPath::parse(path)?)
    }

    #[must_use]
    pub fn get_field(&self, field: &FieldPath) -> Option<Value> {
        let profile = self.profile();
        match field {
            FieldPath::FirstName => text(profile.first_name.as_ref()),
            FieldPath::LastName => text(profile.last_name.as_ref()),
            FieldPath::Email => text(profile.email.as_ref()),
            FieldPath::Phone => text(profile.phone.as_ref()),
            FieldPath::Company => text(profile.company.as_ref()),
            FieldPath::Source => text(profile.source.as_ref()),
            FieldPath::Status => text(profile.status.as_ref()),
            FieldPath::Score => profile.score.map(Value::Number),
            FieldPath::Tags => Some(Value::List(profile.tags.iter().cloned().collect())),
            FieldPath::JobTitle => match self {
                Self::Contact(contact) => text(contact.job_title.as_ref()),
                Self::Lead(_) => None,
            },
            FieldPath::Custom(key) => profile.custom_fields.get(key).cloned(),
        }
    }

    /// Write a field by dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFieldPath`] when the path does not
    /// resolve, or [`ValidationError::FieldType`] when the value shape does
    /// not fit the field.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), ValidationError> {
        let field =
            FieldPath::parse(path).ok_or_else(|| ValidationError::InvalidFieldPath(path.into()))?;
        self.set_field(&field, path, value)
    }

    fn set_field(
        &mut self,
        field: &FieldPath,
        path: &str,
        value: Value,
    ) -> Result<(), ValidationError> {
        if let FieldPath::JobTitle = field {
            return match self {
                Self::Contact(contact) => set_text(&mut contact.job_title, path, value),
                Self::Lead(_) => Err(ValidationError::InvalidFieldPath(path.to_string())),
            };
        }
        let profile = self.profile_mut();
        match field {
            FieldPath::FirstName => set_text(&mut profile.first_name, path, value),
            FieldPath::LastName => set_text(&mut profile.last_name, path, value),
            FieldPath::Email => set_text(&mut profile.email, path, value),
            FieldPath::Phone => set_text(&mut profile.phone, path, value),
            FieldPath::Company => set_text(&mut profile.company, path, value),
            FieldPath::Source => set_text(&mut profile.source, path, value),
            FieldPath::Status => set_text(&mut profile.status, path, value),
            FieldPath::Score => {
                profile.score = match value {
                    Value::Null => None,
                    other => Some(other.as_number().ok_or_else(|| ValidationError::FieldType {
                        field: path.to_string(),
                        value: other.kind(),
                    })?),
                };
                Ok(())
            }
            FieldPath::Tags => match value {
                Value::List(items) => {
                    profile.tags = items.into_iter().collect();
                    Ok(())
                }
                Value::Null => {
                    profile.tags.clear();
                    Ok(())
                }
                other => Err(ValidationError::FieldType {
                    field: path.to_string(),
                    value: other.kind(),
                }),
            },
            FieldPath::Custom(key) => {
                profile.custom_fields.insert(key.clone(), value);
                Ok(())
            }
            FieldPath::JobTitle => Err(ValidationError::InvalidFieldPath(path.to_string())),
        }
    }

    /// Union `tags` into the record's tags. Returns `true` when anything changed.
    pub fn add_tags<I, S>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current = &mut self.profile_mut().tags;
        let mut changed = false;
        for tag in tags {
            changed |= current.insert(tag.into());
        }
        changed
    }

    /// Remove `tags` from the record's tags. Returns `true` when anything changed.
    pub fn remove_tags<'a, I>(&mut self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let current = &mut self.profile_mut().tags;
        let mut changed = false;
        for tag in tags {
            changed |= current.remove(tag);
        }
        changed
    }

    /// Append a timeline entry.
    pub fn push_activity(&mut self, activity: Activity) {
        match self {
            Self::Lead(lead) => lead.activities.push(activity),
            Self::Contact(contact) => contact.activities.push(activity),
        }
    }

    #[must_use]
    pub fn activities(&self) -> &[Activity] {
        match self {
            Self::Lead(lead) => &lead.activities,
            Self::Contact(contact) => &contact.activities,
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self, now: Timestamp) {
        match self {
            Self::Lead(lead) => lead.updated_at = now,
            Self::Contact(contact) => contact.updated_at = now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_with_source(source: &str) -> Record {
        Record::Lead(Lead::new(
            OwnerId::new(),
            Profile {
                source: Some(source.to_string()),
                ..Profile::default()
            },
            crate::time::now(),
        ))
    }

    #[test]
    fn should_read_top_level_field_by_path() {
        let record = lead_with_source("website");
        assert_eq!(record.get("source"), Some(Value::from("website")));
    }

    #[test]
    fn should_read_custom_field_one_level_deep() {
        let mut record = lead_with_source("website");
        record
            .set("customFields.industry", Value::from("retail"))
            .unwrap();
        assert_eq!(
            record.get("customFields.industry"),
            Some(Value::from("retail"))
        );
        assert_eq!(
            record.get("custom_fields.industry"),
            Some(Value::from("retail"))
        );
    }

    #[test]
    fn should_resolve_deep_or_unknown_paths_to_missing() {
        let record = lead_with_source("website");
        assert_eq!(record.get("customFields.a.b"), None);
        assert_eq!(record.get("nope"), None);
        assert_eq!(record.get("source.inner"), None);
        assert_eq!(record.get(""), None);
        assert_eq!(record.get("customFields."), None);
    }

    #[test]
    fn should_report_unset_field_as_missing() {
        let record = lead_with_source("website");
        assert_eq!(record.get("email"), None);
        assert_eq!(record.get("score"), None);
    }

    #[test]
    fn should_reject_setting_unknown_path() {
        let mut record = lead_with_source("website");
        let err = record.set("nested.too.deep", Value::from("x")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFieldPath(_)));
    }

    #[test]
    fn should_coerce_numeric_string_into_score() {
        let mut record = lead_with_source("website");
        record.set("score", Value::from("42")).unwrap();
        assert_eq!(record.get("score"), Some(Value::Number(42.0)));
    }

    #[test]
    fn should_reject_list_for_text_field() {
        let mut record = lead_with_source("website");
        let err = record
            .set("email", Value::List(vec!["a".into()]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::FieldType { .. }));
    }

    #[test]
    fn should_only_expose_job_title_on_contacts() {
        let mut lead = lead_with_source("website");
        assert!(lead.set("jobTitle", Value::from("CTO")).is_err());

        let mut contact = Record::Contact(Contact::new(
            OwnerId::new(),
            Profile::default(),
            crate::time::now(),
        ));
        contact.set("jobTitle", Value::from("CTO")).unwrap();
        assert_eq!(contact.get("jobTitle"), Some(Value::from("CTO")));
    }

    #[test]
    fn should_report_change_only_when_tags_are_new() {
        let mut record = lead_with_source("website");
        assert!(record.add_tags(["hot"]));
        assert!(!record.add_tags(["hot"]));
        assert!(record.tags().contains("hot"));
    }

    #[test]
    fn should_remove_tags_and_report_change() {
        let mut record = lead_with_source("website");
        record.add_tags(["hot", "vip"]);
        let remove = vec!["hot".to_string(), "cold".to_string()];
        assert!(record.remove_tags(&remove));
        assert!(!record.remove_tags(&remove));
        assert_eq!(record.tags().len(), 1);
    }

    #[test]
    fn should_convert_lead_into_linked_contact() {
        let now = crate::time::now();
        let mut lead = Lead::new(
            OwnerId::new(),
            Profile {
                email: Some("ada@example.com".into()),
                ..Profile::default()
            },
            now,
        );
        let contact = lead.convert(now).unwrap();
        assert_eq!(contact.converted_from, Some(lead.id));
        assert_eq!(lead.converted_to, Some(contact.id));
        assert_eq!(contact.profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(lead.profile.status.as_deref(), Some("converted"));
    }

    #[test]
    fn should_refuse_to_convert_twice() {
        let now = crate::time::now();
        let mut lead = Lead::new(OwnerId::new(), Profile::default(), now);
        lead.convert(now).unwrap();
        assert!(matches!(
            lead.convert(now),
            Err(FunnelError::Conflict(ConflictError::AlreadyConverted(_)))
        ));
    }

    #[test]
    fn should_roundtrip_record_through_tagged_json() {
        let record = lead_with_source("website");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "lead");
        assert_eq!(json["source"], "website");
        let parsed: Record = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
