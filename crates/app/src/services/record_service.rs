//! Record service — use-cases for leads and contacts.
//!
//! Every mutation is persisted first and then published on the event bus,
//! which is what the automation engine listens to.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use funnelhub_domain::automation::TriggerEvent;
use funnelhub_domain::error::{ConflictError, FunnelError, NotFoundError};
use funnelhub_domain::event::RecordEvent;
use funnelhub_domain::id::{OwnerId, RecordId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::record::{Contact, Lead, Profile, Record};
use funnelhub_domain::value::Value;

use crate::clock::Clock;
use crate::ports::{Conversion, EventPublisher, LeadConverter, RecordQuery, RecordRepository};

/// Persists both sides of a lead conversion through a [`RecordRepository`].
///
/// The contact is created before the lead is updated. The two writes are
/// not transactional.
#[derive(Clone)]
pub struct RecordConverter<RR> {
    records: RR,
    clock: Arc<dyn Clock>,
}

impl<RR: RecordRepository> RecordConverter<RR> {
    pub fn new(records: RR, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }
}

impl<RR: RecordRepository> LeadConverter for RecordConverter<RR> {
    fn convert(&self, lead: Lead) -> impl Future<Output = Result<Conversion, FunnelError>> + Send {
        let now = self.clock.now();
        async move {
            let mut lead = lead;
            let contact = lead.convert(now)?;
            self.records.create(Record::Contact(contact.clone())).await?;
            self.records.update(Record::Lead(lead.clone())).await?;
            tracing::info!(lead_id = %lead.id, contact_id = %contact.id, "lead converted");
            Ok(Conversion { lead, contact })
        }
    }
}

/// Application service for lead and contact operations.
pub struct RecordService<RR, P> {
    records: RR,
    publisher: P,
    converter: RecordConverter<RR>,
    clock: Arc<dyn Clock>,
}

impl<RR, P> RecordService<RR, P>
where
    RR: RecordRepository + Clone,
    P: EventPublisher,
{
    pub fn new(records: RR, publisher: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            converter: RecordConverter::new(records.clone(), clock.clone()),
            records,
            publisher,
            clock,
        }
    }

    /// Create a lead and publish `new_lead`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or an error from the event bus.
    #[tracing::instrument(skip(self, profile))]
    pub async fn create_lead(&self, owner_id: OwnerId, profile: Profile) -> Result<Record, FunnelError> {
        let lead = Record::Lead(Lead::new(owner_id, profile, self.clock.now()));
        self.insert(lead).await
    }

    /// Create a contact and publish `new_contact`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or an error from the event bus.
    #[tracing::instrument(skip(self, profile))]
    pub async fn create_contact(
        &self,
        owner_id: OwnerId,
        profile: Profile,
        job_title: Option<String>,
    ) -> Result<Record, FunnelError> {
        let mut contact = Contact::new(owner_id, profile, self.clock.now());
        contact.job_title = job_title;
        self.insert(Record::Contact(contact)).await
    }

    async fn insert(&self, record: Record) -> Result<Record, FunnelError> {
        let record = self.records.create(record).await?;
        tracing::info!(record_id = %record.id(), kind = %record.kind(), "record created");
        self.publisher
            .publish(RecordEvent::created(record.clone()))
            .await?;
        Ok(record)
    }

    /// Look up a record of `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] when no record with `id` exists for
    /// this owner, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner_id: OwnerId, id: RecordId) -> Result<Record, FunnelError> {
        self.records
            .get_by_id(id)
            .await?
            .filter(|r| r.owner_id() == owner_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Record",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// One page of records, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, query: RecordQuery) -> Result<Paginated<Record>, FunnelError> {
        self.records.list(query).await
    }

    /// Set fields by dotted path and publish `lead_updated`/`contact_updated`.
    ///
    /// All paths are applied before anything is written, so a bad path
    /// leaves the record untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown records,
    /// [`FunnelError::Validation`] for unknown paths or mistyped values, or a
    /// storage error.
    #[tracing::instrument(skip(self, fields))]
    pub async fn update_fields(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        fields: BTreeMap<String, Value>,
    ) -> Result<Record, FunnelError> {
        let mut record = self.get(owner_id, id).await?;
        for (path, value) in fields {
            record.set(&path, value)?;
        }
        self.save(record, RecordEvent::updated).await
    }

    /// Add tags, publishing `tag_added` when the set changed.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown records, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn add_tags(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        tags: Vec<String>,
    ) -> Result<Record, FunnelError> {
        let mut record = self.get(owner_id, id).await?;
        if !record.add_tags(tags) {
            return Ok(record);
        }
        self.save(record, |record| {
            RecordEvent::new(TriggerEvent::TagAdded, record)
        })
        .await
    }

    /// Remove tags, publishing `tag_removed` when the set changed.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown records, or a storage
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_tags(
        &self,
        owner_id: OwnerId,
        id: RecordId,
        tags: Vec<String>,
    ) -> Result<Record, FunnelError> {
        let mut record = self.get(owner_id, id).await?;
        if !record.remove_tags(&tags) {
            return Ok(record);
        }
        self.save(record, |record| {
            RecordEvent::new(TriggerEvent::TagRemoved, record)
        })
        .await
    }

    async fn save(
        &self,
        mut record: Record,
        event: impl FnOnce(Record) -> RecordEvent,
    ) -> Result<Record, FunnelError> {
        record.touch(self.clock.now());
        let record = self.records.update(record).await?;
        self.publisher.publish(event(record.clone())).await?;
        Ok(record)
    }

    /// Convert a lead into a contact and publish `new_contact`.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown records,
    /// [`FunnelError::Conflict`] when the record is a contact or the lead is
    /// already converted, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn convert_lead(&self, owner_id: OwnerId, id: RecordId) -> Result<Conversion, FunnelError> {
        let Record::Lead(lead) = self.get(owner_id, id).await? else {
            return Err(ConflictError::NotALead(id.to_string()).into());
        };
        let conversion = self.converter.convert(lead).await?;
        self.publisher
            .publish(RecordEvent::created(Record::Contact(
                conversion.contact.clone(),
            )))
            .await?;
        Ok(conversion)
    }

    /// The converter this service uses, for wiring the action executor.
    pub fn converter(&self) -> RecordConverter<RR> {
        self.converter.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{InMemoryRecordRepo, SpyPublisher};
    use chrono::{Duration, TimeZone, Utc};
    use funnelhub_domain::error::ValidationError;
    use funnelhub_domain::page::Page;
    use funnelhub_domain::record::RecordKind;

    fn service() -> (
        RecordService<InMemoryRecordRepo, SpyPublisher>,
        InMemoryRecordRepo,
        SpyPublisher,
        Arc<ManualClock>,
    ) {
        let repo = InMemoryRecordRepo::default();
        let publisher = SpyPublisher::default();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        (
            RecordService::new(repo.clone(), publisher.clone(), clock.clone()),
            repo,
            publisher,
            clock,
        )
    }

    fn website() -> Profile {
        Profile {
            first_name: Some("Ada".into()),
            source: Some("website".into()),
            ..Profile::default()
        }
    }

    #[tokio::test]
    async fn should_publish_new_lead_when_lead_created() {
        let (svc, repo, publisher, _) = service();
        let owner = OwnerId::new();

        let lead = svc.create_lead(owner, website()).await.unwrap();

        assert_eq!(repo.get(lead.id()), lead);
        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, TriggerEvent::NewLead);
        assert_eq!(events[0].record.id(), lead.id());
    }

    #[tokio::test]
    async fn should_publish_new_contact_when_contact_created() {
        let (svc, _, publisher, _) = service();

        let contact = svc
            .create_contact(OwnerId::new(), website(), Some("CTO".into()))
            .await
            .unwrap();

        assert_eq!(contact.kind(), RecordKind::Contact);
        assert_eq!(contact.get("jobTitle"), Some(Value::String("CTO".into())));
        assert_eq!(publisher.events()[0].event, TriggerEvent::NewContact);
    }

    #[tokio::test]
    async fn should_return_not_found_when_record_belongs_to_other_owner() {
        let (svc, _, _, _) = service();
        let lead = svc.create_lead(OwnerId::new(), website()).await.unwrap();

        let err = svc.get(OwnerId::new(), lead.id()).await.unwrap_err();

        assert!(matches!(err, FunnelError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_update_fields_and_publish_lead_updated() {
        let (svc, repo, publisher, clock) = service();
        let owner = OwnerId::new();
        let lead = svc.create_lead(owner, website()).await.unwrap();
        clock.advance(Duration::minutes(1));

        let updated = svc
            .update_fields(
                owner,
                lead.id(),
                BTreeMap::from([
                    ("status".to_string(), Value::String("qualified".into())),
                    ("customFields.budget".to_string(), Value::Number(5000.0)),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(updated.get("status"), Some(Value::String("qualified".into())));
        assert_eq!(updated.get("customFields.budget"), Some(Value::Number(5000.0)));
        assert_eq!(updated.updated_at(), clock.now());
        assert_eq!(repo.get(lead.id()), updated);
        assert_eq!(publisher.events()[1].event, TriggerEvent::LeadUpdated);
    }

    #[tokio::test]
    async fn should_reject_unknown_field_without_writing() {
        let (svc, repo, publisher, _) = service();
        let owner = OwnerId::new();
        let lead = svc.create_lead(owner, website()).await.unwrap();

        let err = svc
            .update_fields(
                owner,
                lead.id(),
                BTreeMap::from([("nope.deep".to_string(), Value::Bool(true))]),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FunnelError::Validation(ValidationError::InvalidFieldPath(_))
        ));
        assert_eq!(repo.writes(), 0);
        assert_eq!(publisher.events().len(), 1);
    }

    #[tokio::test]
    async fn should_publish_tag_events_only_when_tags_changed() {
        let (svc, _, publisher, _) = service();
        let owner = OwnerId::new();
        let lead = svc.create_lead(owner, website()).await.unwrap();

        svc.add_tags(owner, lead.id(), vec!["hot".into()]).await.unwrap();
        svc.add_tags(owner, lead.id(), vec!["hot".into()]).await.unwrap();
        let after = svc
            .remove_tags(owner, lead.id(), vec!["hot".into()])
            .await
            .unwrap();
        svc.remove_tags(owner, lead.id(), vec!["hot".into()])
            .await
            .unwrap();

        let kinds: Vec<_> = publisher.events().iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                TriggerEvent::NewLead,
                TriggerEvent::TagAdded,
                TriggerEvent::TagRemoved
            ]
        );
        assert!(after.tags().is_empty());
    }

    #[tokio::test]
    async fn should_convert_lead_and_publish_new_contact() {
        let (svc, repo, publisher, _) = service();
        let owner = OwnerId::new();
        let lead = svc.create_lead(owner, website()).await.unwrap();

        let conversion = svc.convert_lead(owner, lead.id()).await.unwrap();

        assert_eq!(conversion.lead.converted_to, Some(conversion.contact.id));
        assert_eq!(conversion.contact.converted_from, Some(lead.id()));
        assert_eq!(
            repo.get(conversion.contact.id),
            Record::Contact(conversion.contact.clone())
        );
        assert_eq!(repo.get(lead.id()), Record::Lead(conversion.lead.clone()));
        let last = publisher.events().pop().unwrap();
        assert_eq!(last.event, TriggerEvent::NewContact);
        assert_eq!(last.record.id(), conversion.contact.id);
    }

    #[tokio::test]
    async fn should_reject_conversion_when_already_converted() {
        let (svc, _, _, _) = service();
        let owner = OwnerId::new();
        let lead = svc.create_lead(owner, website()).await.unwrap();
        svc.convert_lead(owner, lead.id()).await.unwrap();

        let err = svc.convert_lead(owner, lead.id()).await.unwrap_err();

        assert!(matches!(
            err,
            FunnelError::Conflict(ConflictError::AlreadyConverted(_))
        ));
    }

    #[tokio::test]
    async fn should_reject_conversion_when_record_is_contact() {
        let (svc, _, _, _) = service();
        let owner = OwnerId::new();
        let contact = svc.create_contact(owner, website(), None).await.unwrap();

        let err = svc.convert_lead(owner, contact.id()).await.unwrap_err();

        assert!(matches!(
            err,
            FunnelError::Conflict(ConflictError::NotALead(_))
        ));
    }

    #[tokio::test]
    async fn should_list_records_by_kind() {
        let (svc, _, _, _) = service();
        let owner = OwnerId::new();
        svc.create_lead(owner, website()).await.unwrap();
        svc.create_contact(owner, website(), None).await.unwrap();
        svc.create_lead(OwnerId::new(), website()).await.unwrap();

        let leads = svc
            .list(RecordQuery {
                owner_id: owner,
                kind: Some(RecordKind::Lead),
                page: Page::default(),
            })
            .await
            .unwrap();

        assert_eq!(leads.total, 1);
        assert_eq!(leads.items[0].kind(), RecordKind::Lead);
    }
}
