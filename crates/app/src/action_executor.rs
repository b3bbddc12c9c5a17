//! Action executor — applies an automation's actions to a record.
//!
//! Actions run in declared order and best-effort: a failing action is
//! logged and reported but never stops the ones after it. Actions with a
//! delay are not run in-process; they become tasks of type
//! `automation.<action type>` that [`DeferredActionHandler`] picks up later.
//!
//! Mutations are written straight to the record repository and are not
//! published as record events, so automations cannot re-trigger themselves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use funnelhub_domain::automation::{Action, ActionKind, Automation, DEFERRED_TASK_PREFIX};
use funnelhub_domain::error::{ConflictError, FunnelError};
use funnelhub_domain::id::{AutomationId, OwnerId, RecordId, TaskId};
use funnelhub_domain::record::{Activity, Record};
use funnelhub_domain::task::{Payload, Task, TaskResult};

use crate::clock::Clock;
use crate::ports::{LeadConverter, Mailer, RecordRepository, TaskRepository, WebhookClient};
use crate::task_handler::{HandlerError, HandlerRegistry, TaskHandler};

/// Method used by `webhook` actions that do not name one.
pub const DEFAULT_WEBHOOK_METHOD: &str = "POST";

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Deferred { task_id: TaskId },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub action: &'static str,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

/// Per-action outcomes of one automation run against one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub automation_id: AutomationId,
    pub record_id: RecordId,
    pub actions: Vec<ActionReport>,
}

impl ExecutionReport {
    /// `true` when no action failed. Deferred actions count as successes.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self
            .actions
            .iter()
            .any(|a| matches!(a.outcome, ActionOutcome::Failed { .. }))
    }
}

/// Payload of a deferred action task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredAction {
    pub automation_id: AutomationId,
    pub record_id: RecordId,
    pub action: Action,
}

/// Runs actions against records, delegating side effects to collaborators.
pub struct ActionExecutor<RR, TR, M, LC, W> {
    records: RR,
    tasks: TR,
    mailer: M,
    converter: LC,
    webhook: W,
    clock: Arc<dyn Clock>,
}

impl<RR, TR, M, LC, W> ActionExecutor<RR, TR, M, LC, W>
where
    RR: RecordRepository,
    TR: TaskRepository,
    M: Mailer,
    LC: LeadConverter,
    W: WebhookClient,
{
    pub fn new(
        records: RR,
        tasks: TR,
        mailer: M,
        converter: LC,
        webhook: W,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            tasks,
            mailer,
            converter,
            webhook,
            clock,
        }
    }

    pub fn records(&self) -> &RR {
        &self.records
    }

    /// Apply every action of `automation` to `record`, in order.
    ///
    /// `record` is the working copy: later actions, and later automations
    /// of the same cycle, observe earlier changes.
    pub async fn execute(&self, automation: &Automation, record: &mut Record) -> ExecutionReport {
        let mut actions = Vec::with_capacity(automation.actions.len());
        for action in &automation.actions {
            let outcome = if action.is_delayed() {
                self.defer(automation.id, record, action).await
            } else {
                self.run_action(&action.kind, record)
                    .await
                    .map(|()| ActionOutcome::Applied)
            };
            let outcome = outcome.unwrap_or_else(|err| {
                tracing::warn!(
                    %err,
                    automation_id = %automation.id,
                    record_id = %record.id(),
                    action = action.type_name(),
                    "automation action failed"
                );
                ActionOutcome::Failed {
                    error: err.to_string(),
                }
            });
            actions.push(ActionReport {
                action: action.type_name(),
                outcome,
            });
        }
        ExecutionReport {
            automation_id: automation.id,
            record_id: record.id(),
            actions,
        }
    }

    async fn defer(
        &self,
        automation_id: AutomationId,
        record: &Record,
        action: &Action,
    ) -> Result<ActionOutcome, FunnelError> {
        let deferred = DeferredAction {
            automation_id,
            record_id: record.id(),
            action: action.clone(),
        };
        let payload = match serde_json::to_value(&deferred).map_err(FunnelError::integration)? {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        };
        let now = self.clock.now();
        let task = Task::builder()
            .owner_id(record.owner_id())
            .task_type(action.deferred_task_type())
            .payload(payload)
            .scheduled_for(now + Duration::minutes(i64::from(action.delay_minutes)))
            .created_at(now)
            .build()?;
        let task = self.tasks.create(task).await?;
        tracing::info!(
            task_id = %task.id,
            %automation_id,
            delay_minutes = action.delay_minutes,
            "deferred automation action"
        );
        Ok(ActionOutcome::Deferred { task_id: task.id })
    }

    /// Run a single action immediately, ignoring any delay.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a field the record cannot hold,
    /// [`ConflictError::NotALead`] when converting a contact, or whatever
    /// the repository or collaborator reports.
    pub async fn run_action(&self, kind: &ActionKind, record: &mut Record) -> Result<(), FunnelError> {
        let now = self.clock.now();
        match kind {
            ActionKind::UpdateField { field, value } => {
                record.set(field, value.clone())?;
                self.persist(record, now).await
            }
            ActionKind::AddTag { tags } => {
                if record.add_tags(tags.iter().cloned()) {
                    self.persist(record, now).await?;
                }
                Ok(())
            }
            ActionKind::RemoveTag { tags } => {
                if record.remove_tags(tags) {
                    self.persist(record, now).await?;
                }
                Ok(())
            }
            ActionKind::SendEmail { template_id } => {
                self.mailer
                    .send_template(record.owner_id(), record, template_id)
                    .await?;
                record.push_activity(Activity {
                    kind: "email_sent".to_string(),
                    description: format!("template {template_id}"),
                    at: now,
                });
                self.persist(record, now).await
            }
            ActionKind::CreateTask {
                task_type,
                payload,
                priority,
            } => {
                let task = Task::builder()
                    .owner_id(record.owner_id())
                    .task_type(task_type.clone())
                    .payload(payload.clone())
                    .priority(priority.unwrap_or_default())
                    .scheduled_for(now)
                    .created_at(now)
                    .build()?;
                let task = self.tasks.create(task).await?;
                tracing::info!(task_id = %task.id, task_type = %task.task_type, "automation created task");
                Ok(())
            }
            ActionKind::ConvertLead => match record {
                Record::Lead(lead) => {
                    let conversion = self.converter.convert(lead.clone()).await?;
                    tracing::info!(
                        record_id = %conversion.lead.id,
                        contact_id = %conversion.contact.id,
                        "automation converted lead"
                    );
                    *record = Record::Lead(conversion.lead);
                    Ok(())
                }
                Record::Contact(contact) => {
                    Err(ConflictError::NotALead(contact.id.to_string()).into())
                }
            },
            ActionKind::Webhook { url, method, .. } => {
                let mut wire = serde_json::to_value(kind).map_err(FunnelError::integration)?;
                let body = wire
                    .get_mut("params")
                    .map(serde_json::Value::take)
                    .unwrap_or_default();
                let method = method.as_deref().unwrap_or(DEFAULT_WEBHOOK_METHOD);
                self.webhook.deliver(url, method, body).await
            }
        }
    }

    async fn persist(
        &self,
        record: &mut Record,
        now: funnelhub_domain::time::Timestamp,
    ) -> Result<(), FunnelError> {
        record.touch(now);
        self.records.update(record.clone()).await?;
        Ok(())
    }
}

/// Runs delayed actions once their task comes due.
///
/// Deferred runs do not touch automation stats.
pub struct DeferredActionHandler<RR, TR, M, LC, W> {
    executor: Arc<ActionExecutor<RR, TR, M, LC, W>>,
}

impl<RR, TR, M, LC, W> DeferredActionHandler<RR, TR, M, LC, W>
where
    RR: RecordRepository + 'static,
    TR: TaskRepository + 'static,
    M: Mailer + 'static,
    LC: LeadConverter + 'static,
    W: WebhookClient + 'static,
{
    pub fn new(executor: Arc<ActionExecutor<RR, TR, M, LC, W>>) -> Self {
        Self { executor }
    }

    /// Register one shared handler for every `automation.<type>` task type.
    pub fn register(self, registry: &mut HandlerRegistry) {
        let handler: Arc<dyn TaskHandler> = Arc::new(self);
        for name in ActionKind::TYPE_NAMES {
            registry.register(format!("{DEFERRED_TASK_PREFIX}{name}"), handler.clone());
        }
    }
}

#[async_trait]
impl<RR, TR, M, LC, W> TaskHandler for DeferredActionHandler<RR, TR, M, LC, W>
where
    RR: RecordRepository + 'static,
    TR: TaskRepository + 'static,
    M: Mailer + 'static,
    LC: LeadConverter + 'static,
    W: WebhookClient + 'static,
{
    async fn handle(
        &self,
        owner_id: OwnerId,
        payload: &Payload,
    ) -> Result<TaskResult, HandlerError> {
        let deferred: DeferredAction =
            serde_json::from_value(serde_json::Value::Object(payload.clone()))?;
        let record = self
            .executor
            .records
            .get_by_id(deferred.record_id)
            .await?
            .filter(|r| r.owner_id() == owner_id);
        let Some(mut record) = record else {
            return Ok(TaskResult::failure(format!(
                "Record '{}' not found",
                deferred.record_id
            )));
        };
        let action = deferred.action.type_name();
        match self
            .executor
            .run_action(&deferred.action.kind, &mut record)
            .await
        {
            Ok(()) => Ok(TaskResult::ok(format!("{action} applied"))),
            Err(err) => Ok(TaskResult::failure(err.to_string())),
        }
    }
}
