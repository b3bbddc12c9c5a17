//! Automation service — use-cases for managing automations.

use std::sync::Arc;

use funnelhub_domain::automation::{
    Action, Automation, AutomationStatus, Condition, Trigger,
};
use funnelhub_domain::error::{FunnelError, NotFoundError};
use funnelhub_domain::id::{AutomationId, OwnerId};
use funnelhub_domain::page::Paginated;

use crate::clock::Clock;
use crate::ports::{AutomationQuery, AutomationRepository};

/// Caller-editable part of an automation, used for create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationDraft {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `draft` on create and to the current status on update.
    pub status: Option<AutomationStatus>,
    pub trigger: Trigger,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// Application service for automation CRUD operations.
pub struct AutomationService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R: AutomationRepository> AutomationService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Create a new automation after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, draft), fields(automation_name = %draft.name))]
    pub async fn create(
        &self,
        owner_id: OwnerId,
        draft: AutomationDraft,
    ) -> Result<Automation, FunnelError> {
        let mut builder = Automation::builder()
            .owner_id(owner_id)
            .name(draft.name)
            .status(draft.status.unwrap_or_default())
            .trigger(draft.trigger)
            .conditions(draft.conditions)
            .actions(draft.actions)
            .created_at(self.clock.now());
        if let Some(description) = draft.description {
            builder = builder.description(description);
        }
        let automation = self.repo.create(builder.build()?).await?;
        tracing::info!(automation_id = %automation.id, "automation created");
        Ok(automation)
    }

    /// Look up an automation of `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] when no automation with `id` exists
    /// for this owner, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner_id: OwnerId, id: AutomationId) -> Result<Automation, FunnelError> {
        self.repo
            .get_by_id(id)
            .await?
            .filter(|a| a.owner_id == owner_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Automation",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// One page of automations, newest first, filtered by status and
    /// trigger type.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, query: AutomationQuery) -> Result<Paginated<Automation>, FunnelError> {
        self.repo.list(query).await
    }

    /// Replace the editable part of an automation. Stats are kept.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown automations,
    /// [`FunnelError::Validation`] if invariants fail, or a storage error.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update(
        &self,
        owner_id: OwnerId,
        id: AutomationId,
        draft: AutomationDraft,
    ) -> Result<Automation, FunnelError> {
        let mut automation = self.get(owner_id, id).await?;
        automation.name = draft.name;
        automation.description = draft.description;
        if let Some(status) = draft.status {
            automation.status = status;
        }
        automation.trigger = draft.trigger;
        automation.conditions = draft.conditions;
        automation.actions = draft.actions;
        automation.updated_at = self.clock.now();
        automation.validate()?;
        self.repo.update(automation).await
    }

    /// Make an automation eligible to run.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown automations, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self, owner_id: OwnerId, id: AutomationId) -> Result<Automation, FunnelError> {
        let mut automation = self.get(owner_id, id).await?;
        automation.activate(self.clock.now());
        let automation = self.repo.update(automation).await?;
        tracing::info!(automation_id = %id, "automation activated");
        Ok(automation)
    }

    /// Stop an automation from running.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown automations, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn pause(&self, owner_id: OwnerId, id: AutomationId) -> Result<Automation, FunnelError> {
        let mut automation = self.get(owner_id, id).await?;
        automation.pause(self.clock.now());
        let automation = self.repo.update(automation).await?;
        tracing::info!(automation_id = %id, "automation paused");
        Ok(automation)
    }

    /// Delete an automation.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::NotFound`] for unknown automations, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner_id: OwnerId, id: AutomationId) -> Result<(), FunnelError> {
        self.get(owner_id, id).await?;
        self.repo.delete(id).await?;
        Ok(())
    }
}
