//! Condition — a field test that must hold for the automation to proceed.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::Record;
use crate::value::Value;

/// Comparison applied between a record field and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    InList,
    NotInList,
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::InList => "in_list",
            Self::NotInList => "not_in_list",
        }
    }

    fn requires_list(self) -> bool {
        matches!(self, Self::InList | Self::NotInList)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field <operator> value` test against a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted field path, e.g. `source` or `customFields.industry`.
    pub field: String,
    #[serde(alias = "op")]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::ListValueRequired`] when `in_list` or
    /// `not_in_list` is given anything but a list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.operator.requires_list() && self.value.as_list().is_none() {
            return Err(ValidationError::ListValueRequired(self.operator.as_str()));
        }
        Ok(())
    }

    /// Test this condition against `record`. Never fails: a missing field
    /// or a type mismatch yields `false`, except for the emptiness checks.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field);
        match self.operator {
            Operator::IsEmpty => actual.as_ref().is_none_or(Value::is_empty),
            Operator::IsNotEmpty => actual.as_ref().is_some_and(|v| !v.is_empty()),
            op => actual.is_some_and(|actual| compare(op, &actual, &self.value)),
        }
    }
}

fn compare(op: Operator, actual: &Value, expected: &Value) -> bool {
    match op {
        Operator::Equals => actual.strict_eq(expected),
        Operator::NotEquals => !actual.strict_eq(expected),
        Operator::Contains => contains(actual, expected).unwrap_or(false),
        Operator::NotContains => contains(actual, expected).is_some_and(|found| !found),
        Operator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.starts_with(e),
            _ => false,
        },
        Operator::EndsWith => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.ends_with(e),
            _ => false,
        },
        Operator::GreaterThan => actual.compare(expected) == Some(Ordering::Greater),
        Operator::LessThan => actual.compare(expected) == Some(Ordering::Less),
        Operator::InList => in_list(actual, expected).unwrap_or(false),
        Operator::NotInList => in_list(actual, expected).is_some_and(|found| !found),
        Operator::IsEmpty => actual.is_empty(),
        Operator::IsNotEmpty => !actual.is_empty(),
    }
}

/// `None` when the shapes cannot be tested, so negations stay fail-closed.
fn contains(actual: &Value, expected: &Value) -> Option<bool> {
    match actual {
        Value::String(haystack) => expected.as_str().map(|needle| haystack.contains(needle)),
        Value::List(items) => expected.scalar_key().map(|key| items.contains(&key)),
        _ => None,
    }
}

fn in_list(actual: &Value, expected: &Value) -> Option<bool> {
    let list = expected.as_list()?;
    let key = actual.scalar_key()?;
    Some(list.contains(&key))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// AND over `conditions`; an empty list always matches.
#[must_use]
pub fn evaluate(conditions: &[Condition], record: &Record) -> bool {
    conditions.iter().all(|condition| condition.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::OwnerId;
    use crate::record::{Contact, Lead, Profile};
    use crate::time::now;

    fn lead(profile: Profile) -> Record {
        Record::Lead(Lead::new(OwnerId::new(), profile, now()))
    }

    fn website_lead() -> Record {
        lead(Profile {
            source: Some("website".into()),
            company: Some("Acme Corp".into()),
            score: Some(72.0),
            tags: ["hot".to_string(), "b2b".to_string()].into(),
            ..Profile::default()
        })
    }

    #[test]
    fn should_match_any_record_when_conditions_are_empty() {
        assert!(evaluate(&[], &website_lead()));
        assert!(evaluate(&[], &lead(Profile::default())));
    }

    #[test]
    fn should_match_equals_on_same_value() {
        let c = Condition::new("source", Operator::Equals, "website");
        assert!(evaluate(std::slice::from_ref(&c), &website_lead()));

        let referral = lead(Profile {
            source: Some("referral".into()),
            ..Profile::default()
        });
        assert!(!evaluate(&[c], &referral));
    }

    #[test]
    fn should_and_all_conditions() {
        let record = website_lead();
        let ok = Condition::new("source", Operator::Equals, "website");
        let fail = Condition::new("company", Operator::StartsWith, "Globex");
        assert!(evaluate(&[ok.clone()], &record));
        assert!(!evaluate(&[ok, fail], &record));
    }

    #[test]
    fn should_test_substring_and_list_membership_with_contains() {
        let record = website_lead();
        assert!(Condition::new("company", Operator::Contains, "Acme").matches(&record));
        assert!(Condition::new("tags", Operator::Contains, "hot").matches(&record));
        assert!(!Condition::new("tags", Operator::Contains, "cold").matches(&record));
        assert!(Condition::new("tags", Operator::NotContains, "cold").matches(&record));
    }

    #[test]
    fn should_test_prefix_and_suffix() {
        let record = website_lead();
        assert!(Condition::new("company", Operator::StartsWith, "Acme").matches(&record));
        assert!(Condition::new("company", Operator::EndsWith, "Corp").matches(&record));
        assert!(!Condition::new("score", Operator::StartsWith, "7").matches(&record));
    }

    #[test]
    fn should_compare_numbers_and_numeric_strings() {
        let record = website_lead();
        assert!(Condition::new("score", Operator::GreaterThan, 50.0).matches(&record));
        assert!(Condition::new("score", Operator::GreaterThan, "50").matches(&record));
        assert!(Condition::new("score", Operator::LessThan, 100_i64).matches(&record));
        assert!(!Condition::new("score", Operator::LessThan, 72.0).matches(&record));
    }

    #[test]
    fn should_compare_strings_lexically() {
        let record = website_lead();
        assert!(Condition::new("source", Operator::GreaterThan, "referral").matches(&record));
    }

    #[test]
    fn should_evaluate_in_list_membership() {
        let record = website_lead();
        let list = Value::List(vec!["website".into(), "ads".into()]);
        assert!(Condition::new("source", Operator::InList, list.clone()).matches(&record));
        assert!(!Condition::new("source", Operator::NotInList, list).matches(&record));
    }

    #[test]
    fn should_treat_missing_fields_as_empty() {
        let record = lead(Profile::default());
        assert!(Condition::new("phone", Operator::IsEmpty, Value::Null).matches(&record));
        assert!(!Condition::new("phone", Operator::IsNotEmpty, Value::Null).matches(&record));
        assert!(Condition::new("tags", Operator::IsEmpty, Value::Null).matches(&record));
        assert!(Condition::new("customFields.x", Operator::IsEmpty, Value::Null).matches(&record));
    }

    #[test]
    fn should_fail_closed_when_field_is_missing() {
        let record = lead(Profile::default());
        let list = Value::List(vec!["a".into()]);
        for c in [
            Condition::new("source", Operator::NotEquals, "website"),
            Condition::new("company", Operator::NotContains, "Acme"),
            Condition::new("source", Operator::NotInList, list),
            Condition::new("score", Operator::LessThan, 10.0),
        ] {
            assert!(!c.matches(&record), "{c} should not match");
        }
    }

    #[test]
    fn should_resolve_unknown_or_deep_paths_as_missing() {
        let record = website_lead();
        assert!(!Condition::new("nope", Operator::NotEquals, "x").matches(&record));
        assert!(!Condition::new("customFields.a.b", Operator::NotEquals, "x").matches(&record));
        assert!(Condition::new("customFields.a.b", Operator::IsEmpty, Value::Null).matches(&record));
    }

    #[test]
    fn should_read_custom_fields_one_level_deep() {
        let mut profile = Profile::default();
        profile
            .custom_fields
            .insert("industry".into(), Value::from("saas"));
        let record = Record::Contact(Contact::new(OwnerId::new(), profile, now()));
        assert!(Condition::new("customFields.industry", Operator::Equals, "saas").matches(&record));
    }

    #[test]
    fn should_evaluate_false_on_type_mismatch() {
        let record = website_lead();
        assert!(!Condition::new("source", Operator::Equals, 1.0).matches(&record));
        assert!(!Condition::new("score", Operator::Contains, "7").matches(&record));
        assert!(!Condition::new("score", Operator::NotContains, "7").matches(&record));
    }

    #[test]
    fn should_require_list_value_for_in_list_operators() {
        let c = Condition::new("source", Operator::InList, "website");
        assert_eq!(
            c.validate(),
            Err(ValidationError::ListValueRequired("in_list"))
        );
        let ok = Condition::new("source", Operator::InList, Value::List(vec![]));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn should_accept_op_alias_when_deserializing() {
        let json = serde_json::json!({"field": "source", "op": "equals", "value": "website"});
        let c: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(c.operator, Operator::Equals);
        assert_eq!(c.value, Value::from("website"));
    }

    #[test]
    fn should_match_numeric_list_members_by_key() {
        let json = serde_json::json!({"field": "score", "op": "in_list", "value": [72, 80]});
        let c: Condition = serde_json::from_value(json).unwrap();
        assert!(c.validate().is_ok());
        assert!(c.matches(&website_lead()));
    }
}
