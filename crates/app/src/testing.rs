//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use funnelhub_domain::automation::{Automation, AutomationStatus, Trigger};
use funnelhub_domain::error::FunnelError;
use funnelhub_domain::event::RecordEvent;
use funnelhub_domain::id::{AutomationId, OwnerId, RecordId, TaskId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::record::{Lead, Record, RecordKind};
use funnelhub_domain::task::{Task, TaskResult, TaskStatus};
use funnelhub_domain::time::Timestamp;

use crate::ports::{
    AutomationQuery, AutomationRepository, Conversion, EventPublisher, LeadConverter, Mailer,
    RecordQuery, RecordRepository, TaskQuery, TaskRepository, WebhookClient,
};

// ── In-memory task repo ────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryTaskRepo {
    pub store: Arc<Mutex<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepo {
    pub fn with(tasks: Vec<Task>) -> Self {
        let repo = Self::default();
        for task in tasks {
            repo.store.lock().unwrap().insert(task.id, task);
        }
        repo
    }

    pub fn get(&self, id: TaskId) -> Task {
        self.store.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn all(&self) -> Vec<Task> {
        self.store.lock().unwrap().values().cloned().collect()
    }
}

impl TaskRepository for InMemoryTaskRepo {
    fn create(&self, task: Task) -> impl Future<Output = Result<Task, FunnelError>> + Send {
        self.store.lock().unwrap().insert(task.id, task.clone());
        async { Ok(task) }
    }

    fn get_by_id(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<Task>, FunnelError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn list(
        &self,
        query: TaskQuery,
    ) -> impl Future<Output = Result<Paginated<Task>, FunnelError>> + Send {
        let mut tasks: Vec<Task> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let r = Paginated::from_sorted(tasks, query.page);
        async { Ok(r) }
    }

    fn find_due(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Task>, FunnelError>> + Send {
        let mut due: Vec<Task> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_for.cmp(&b.scheduled_for))
        });
        due.truncate(limit as usize);
        async { Ok(due) }
    }

    fn claim(
        &self,
        id: TaskId,
        started_at: Timestamp,
    ) -> impl Future<Output = Result<bool, FunnelError>> + Send {
        let mut store = self.store.lock().unwrap();
        let claimed = match store.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => task.start(started_at).is_ok(),
            _ => false,
        };
        async move { Ok(claimed) }
    }

    fn complete(
        &self,
        id: TaskId,
        result: TaskResult,
        completed_at: Timestamp,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send {
        let mut store = self.store.lock().unwrap();
        let outcome = match store.get_mut(&id) {
            Some(task) => task.finish(result, completed_at),
            None => Ok(()),
        };
        async { outcome }
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<bool, FunnelError>> + Send {
        let mut store = self.store.lock().unwrap();
        let deletable = store
            .get(&id)
            .is_some_and(|t| t.status != TaskStatus::InProgress);
        if deletable {
            store.remove(&id);
        }
        async move { Ok(deletable) }
    }
}

// ── In-memory automation repo ──────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryAutomationRepo {
    pub store: Arc<Mutex<HashMap<AutomationId, Automation>>>,
}

impl InMemoryAutomationRepo {
    pub fn with(automations: Vec<Automation>) -> Self {
        let repo = Self::default();
        for automation in automations {
            repo.store
                .lock()
                .unwrap()
                .insert(automation.id, automation);
        }
        repo
    }

    pub fn get(&self, id: AutomationId) -> Automation {
        self.store.lock().unwrap().get(&id).cloned().unwrap()
    }

    fn sorted(&self, filter: impl Fn(&Automation) -> bool) -> Vec<Automation> {
        let mut r: Vec<Automation> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|a| filter(a))
            .cloned()
            .collect();
        r.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        r
    }
}

impl AutomationRepository for InMemoryAutomationRepo {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, FunnelError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(automation.id, automation.clone());
        async { Ok(automation) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, FunnelError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn list(
        &self,
        query: AutomationQuery,
    ) -> impl Future<Output = Result<Paginated<Automation>, FunnelError>> + Send {
        let mut r = self.sorted(|a| query.matches(a));
        r.reverse();
        let r = Paginated::from_sorted(r, query.page);
        async { Ok(r) }
    }

    fn find_active_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Vec<Automation>, FunnelError>> + Send {
        let r = self.sorted(|a| a.owner_id == owner_id && a.status == AutomationStatus::Active);
        async { Ok(r) }
    }

    fn find_active_scheduled(
        &self,
    ) -> impl Future<Output = Result<Vec<Automation>, FunnelError>> + Send {
        let r = self.sorted(|a| {
            a.status == AutomationStatus::Active && matches!(a.trigger, Trigger::Scheduled { .. })
        });
        async { Ok(r) }
    }

    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, FunnelError>> + Send {
        let mut store = self.store.lock().unwrap();
        let mut automation = automation;
        if let Some(existing) = store.get(&automation.id) {
            automation.stats = existing.stats;
        }
        store.insert(automation.id, automation.clone());
        async { Ok(automation) }
    }

    fn delete(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<bool, FunnelError>> + Send {
        let removed = self.store.lock().unwrap().remove(&id).is_some();
        async move { Ok(removed) }
    }

    fn record_run(
        &self,
        id: AutomationId,
        success: bool,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send {
        if let Some(a) = self.store.lock().unwrap().get_mut(&id) {
            a.stats.record(success, at);
        }
        async { Ok(()) }
    }
}

// ── In-memory record repo ──────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryRecordRepo {
    pub store: Arc<Mutex<HashMap<RecordId, Record>>>,
    pub writes: Arc<Mutex<u32>>,
}

impl InMemoryRecordRepo {
    pub fn with(records: Vec<Record>) -> Self {
        let repo = Self::default();
        for record in records {
            repo.store.lock().unwrap().insert(record.id(), record);
        }
        repo
    }

    pub fn get(&self, id: RecordId) -> Record {
        self.store.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn writes(&self) -> u32 {
        *self.writes.lock().unwrap()
    }
}

impl RecordRepository for InMemoryRecordRepo {
    fn create(&self, record: Record) -> impl Future<Output = Result<Record, FunnelError>> + Send {
        self.store.lock().unwrap().insert(record.id(), record.clone());
        async { Ok(record) }
    }

    fn get_by_id(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, FunnelError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn update(&self, record: Record) -> impl Future<Output = Result<Record, FunnelError>> + Send {
        self.store.lock().unwrap().insert(record.id(), record.clone());
        *self.writes.lock().unwrap() += 1;
        async { Ok(record) }
    }

    fn list(
        &self,
        query: RecordQuery,
    ) -> impl Future<Output = Result<Paginated<Record>, FunnelError>> + Send {
        let mut r: Vec<Record> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|rec| {
                rec.owner_id() == query.owner_id && query.kind.is_none_or(|k| rec.kind() == k)
            })
            .cloned()
            .collect();
        r.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        let r = Paginated::from_sorted(r, query.page);
        async { Ok(r) }
    }

    fn find_by_owner(
        &self,
        owner_id: OwnerId,
        kind: Option<RecordKind>,
    ) -> impl Future<Output = Result<Vec<Record>, FunnelError>> + Send {
        let mut r: Vec<Record> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|rec| rec.owner_id() == owner_id && kind.is_none_or(|k| rec.kind() == k))
            .cloned()
            .collect();
        r.sort_by_key(Record::created_at);
        async { Ok(r) }
    }
}

// ── Spy publisher ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SpyPublisher {
    pub events: Arc<Mutex<Vec<RecordEvent>>>,
}

impl SpyPublisher {
    pub fn events(&self) -> Vec<RecordEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for SpyPublisher {
    fn publish(&self, event: RecordEvent) -> impl Future<Output = Result<(), FunnelError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

// ── Spy collaborators ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SpyMailer {
    pub sent: Arc<Mutex<Vec<(RecordId, String)>>>,
    pub fail: bool,
}

impl SpyMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(RecordId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for SpyMailer {
    fn send_template(
        &self,
        _owner_id: OwnerId,
        record: &Record,
        template_id: &str,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send {
        let outcome = if self.fail {
            Err(FunnelError::integration("mailer unavailable"))
        } else {
            self.sent
                .lock()
                .unwrap()
                .push((record.id(), template_id.to_string()));
            Ok(())
        };
        async { outcome }
    }
}

#[derive(Clone, Default)]
pub struct SpyWebhook {
    pub calls: Arc<Mutex<Vec<(String, String, serde_json::Value)>>>,
}

impl SpyWebhook {
    pub fn calls(&self) -> Vec<(String, String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebhookClient for SpyWebhook {
    fn deliver(
        &self,
        url: &str,
        method: &str,
        body: serde_json::Value,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), method.to_string(), body));
        async { Ok(()) }
    }
}

/// Converter that writes straight into an [`InMemoryRecordRepo`].
#[derive(Clone, Default)]
pub struct InMemoryConverter {
    pub records: InMemoryRecordRepo,
}

impl LeadConverter for InMemoryConverter {
    fn convert(&self, mut lead: Lead) -> impl Future<Output = Result<Conversion, FunnelError>> + Send {
        let now = lead.updated_at;
        let outcome = lead.convert(now).map(|contact| {
            let mut store = self.records.store.lock().unwrap();
            store.insert(contact.id, Record::Contact(contact.clone()));
            store.insert(lead.id, Record::Lead(lead.clone()));
            Conversion { lead, contact }
        });
        async { outcome }
    }
}
