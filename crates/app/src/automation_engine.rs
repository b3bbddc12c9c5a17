//! Automation engine — matches triggers, evaluates conditions, runs actions
//! and records stats.
//!
//! Two entry points feed the engine:
//!
//! - [`AutomationEngine::process_event`] for record lifecycle events, checked
//!   against the active automations of the record's owner.
//! - [`AutomationEngine::tick_schedule`] for scheduled automations, which
//!   fires at most once per UTC hour slot and treats conditions as a query
//!   over the owner's records.
//!
//! Each (automation, record) pair is one cycle and gets exactly one stats
//! update.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use funnelhub_domain::automation::{Automation, evaluate};
use funnelhub_domain::error::FunnelError;
use funnelhub_domain::event::RecordEvent;
use funnelhub_domain::record::Record;
use funnelhub_domain::time::{Timestamp, hour_slot};

use crate::action_executor::{ActionExecutor, ExecutionReport};
use crate::clock::Clock;
use crate::ports::{
    AutomationRepository, LeadConverter, Mailer, RecordRepository, TaskRepository, WebhookClient,
};

const NO_SWEEP_YET: i64 = i64::MIN;

/// Reactive and scheduled automation engine.
pub struct AutomationEngine<AR, RR, TR, M, LC, W> {
    automations: AR,
    executor: Arc<ActionExecutor<RR, TR, M, LC, W>>,
    clock: Arc<dyn Clock>,
    last_sweep_slot: AtomicI64,
}

impl<AR, RR, TR, M, LC, W> AutomationEngine<AR, RR, TR, M, LC, W>
where
    AR: AutomationRepository,
    RR: RecordRepository,
    TR: TaskRepository,
    M: Mailer,
    LC: LeadConverter,
    W: WebhookClient,
{
    /// Create a new engine.
    pub fn new(
        automations: AR,
        executor: Arc<ActionExecutor<RR, TR, M, LC, W>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            automations,
            executor,
            clock,
            last_sweep_slot: AtomicI64::new(NO_SWEEP_YET),
        }
    }

    /// Run every active automation of the record's owner whose trigger
    /// matches `event` and whose conditions hold.
    ///
    /// The event only carries a snapshot from publish time, so the record is
    /// reloaded first; edits made since then are kept. Automations run in
    /// repository order against that one working copy, so later ones see
    /// what earlier ones changed. A record deleted in the meantime is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading the record or the automations
    /// fails. Action failures are reported per action, not as errors.
    pub async fn process_event(
        &self,
        event: &RecordEvent,
    ) -> Result<Vec<ExecutionReport>, FunnelError> {
        let record_id = event.record.id();
        let Some(mut record) = self
            .executor
            .records()
            .get_by_id(record_id)
            .await?
            .filter(|r| r.owner_id() == event.record.owner_id())
        else {
            tracing::debug!(%record_id, event = %event.event, "record gone before event was processed");
            return Ok(Vec::new());
        };
        let automations = self
            .automations
            .find_active_by_owner(record.owner_id())
            .await?;
        let mut reports = Vec::new();

        for automation in &automations {
            if !automation.trigger.matches_event(event.event, record.kind()) {
                continue;
            }
            if !evaluate(&automation.conditions, &record) {
                tracing::debug!(
                    automation_id = %automation.id,
                    record_id = %record.id(),
                    "conditions not met"
                );
                continue;
            }
            reports.push(self.run_cycle(automation, &mut record).await);
        }

        Ok(reports)
    }

    /// Sweep scheduled automations unless the current hour slot has
    /// already been swept. Returns `None` when skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading automations fails; the slot is
    /// then retried on the next tick.
    pub async fn tick_schedule(&self) -> Result<Option<Vec<ExecutionReport>>, FunnelError> {
        let now = self.clock.now();
        let slot = hour_slot(now).timestamp();
        if self.last_sweep_slot.load(Ordering::Acquire) == slot {
            return Ok(None);
        }
        let reports = self.sweep(now).await?;
        self.last_sweep_slot.store(slot, Ordering::Release);
        Ok(Some(reports))
    }

    /// Run every active scheduled automation due at `now` against every
    /// matching record of its owner.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading automations fails. Failing to load
    /// the records of one automation is logged and skips that automation.
    pub async fn sweep(&self, now: Timestamp) -> Result<Vec<ExecutionReport>, FunnelError> {
        let automations = self.automations.find_active_scheduled().await?;
        let mut reports = Vec::new();

        for automation in automations
            .iter()
            .filter(|a| a.trigger.matches_schedule(now))
        {
            let scope = automation.trigger.entity_scope();
            let records = match self
                .executor
                .records()
                .find_by_owner(automation.owner_id, scope.kind())
                .await
            {
                Ok(records) => records,
                Err(err) => {
                    tracing::error!(%err, automation_id = %automation.id, "failed to load records for scheduled automation");
                    continue;
                }
            };
            for mut record in records
                .into_iter()
                .filter(|r| evaluate(&automation.conditions, r))
            {
                reports.push(self.run_cycle(automation, &mut record).await);
            }
        }

        Ok(reports)
    }

    async fn run_cycle(&self, automation: &Automation, record: &mut Record) -> ExecutionReport {
        tracing::info!(
            automation_id = %automation.id,
            automation_name = %automation.name,
            record_id = %record.id(),
            trigger = automation.trigger.type_name(),
            "automation triggered"
        );
        let report = self.executor.execute(automation, record).await;
        let succeeded = report.succeeded();
        if let Err(err) = self
            .automations
            .record_run(automation.id, succeeded, self.clock.now())
            .await
        {
            tracing::error!(%err, automation_id = %automation.id, "failed to record automation stats");
        }
        report
    }
}
