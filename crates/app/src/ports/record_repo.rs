//! Record repository port — persistence for leads and contacts.

use std::future::Future;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::{OwnerId, RecordId};
use funnelhub_domain::page::{Page, Paginated};
use funnelhub_domain::record::{Record, RecordKind};

/// Filters for [`RecordRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub owner_id: OwnerId,
    pub kind: Option<RecordKind>,
    pub page: Page,
}

/// Repository for persisting and querying [`Record`]s.
pub trait RecordRepository: Send + Sync {
    fn create(&self, record: Record) -> impl Future<Output = Result<Record, FunnelError>> + Send;

    fn get_by_id(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, FunnelError>> + Send;

    fn update(&self, record: Record) -> impl Future<Output = Result<Record, FunnelError>> + Send;

    /// One page of records, newest first.
    fn list(
        &self,
        query: RecordQuery,
    ) -> impl Future<Output = Result<Paginated<Record>, FunnelError>> + Send;

    /// Every record of an owner, optionally restricted to one kind.
    fn find_by_owner(
        &self,
        owner_id: OwnerId,
        kind: Option<RecordKind>,
    ) -> impl Future<Output = Result<Vec<Record>, FunnelError>> + Send;
}
