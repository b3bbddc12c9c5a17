//! Automation repository port — persistence for automations.

use std::future::Future;

use funnelhub_domain::automation::{Automation, AutomationStatus};
use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::{AutomationId, OwnerId};
use funnelhub_domain::page::{Page, Paginated};
use funnelhub_domain::time::Timestamp;

/// Filters for [`AutomationRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationQuery {
    pub owner_id: OwnerId,
    pub status: Option<AutomationStatus>,
    /// Event name or `"scheduled"`.
    pub trigger_type: Option<String>,
    pub page: Page,
}

impl AutomationQuery {
    #[must_use]
    pub fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            status: None,
            trigger_type: None,
            page: Page::default(),
        }
    }

    #[must_use]
    pub fn matches(&self, automation: &Automation) -> bool {
        automation.owner_id == self.owner_id
            && self.status.is_none_or(|status| automation.status == status)
            && self
                .trigger_type
                .as_deref()
                .is_none_or(|t| automation.trigger.type_name() == t)
    }
}

/// Repository for persisting and querying [`Automation`]s.
pub trait AutomationRepository: Send + Sync {
    /// Create a new automation in storage.
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, FunnelError>> + Send;

    /// Get an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, FunnelError>> + Send;

    /// One page of automations matching `query`, newest first.
    fn list(
        &self,
        query: AutomationQuery,
    ) -> impl Future<Output = Result<Paginated<Automation>, FunnelError>> + Send;

    /// Active automations of one owner, oldest first.
    fn find_active_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Vec<Automation>, FunnelError>> + Send;

    /// Active automations with a scheduled trigger, across all owners.
    fn find_active_scheduled(
        &self,
    ) -> impl Future<Output = Result<Vec<Automation>, FunnelError>> + Send;

    /// Update an existing automation's definition and status.
    ///
    /// Stats are left untouched; they only move through [`Self::record_run`].
    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, FunnelError>> + Send;

    /// Delete an automation. Returns `false` when it did not exist.
    fn delete(&self, id: AutomationId)
    -> impl Future<Output = Result<bool, FunnelError>> + Send;

    /// Count one execution cycle as a single atomic increment.
    fn record_run(
        &self,
        id: AutomationId,
        success: bool,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send;
}
