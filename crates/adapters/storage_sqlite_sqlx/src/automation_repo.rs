//! `SQLite` implementation of [`AutomationRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use funnelhub_app::ports::{AutomationQuery, AutomationRepository};
use funnelhub_domain::automation::{Automation, AutomationStats, AutomationStatus};
use funnelhub_domain::error::{FunnelError, NotFoundError};
use funnelhub_domain::id::{AutomationId, OwnerId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::time::Timestamp;

use crate::columns::{
    decode, parse_json, parse_optional_timestamp, parse_timestamp, timestamp, total, window,
};
use crate::error::StorageError;

struct Wrapper(Automation);

impl Wrapper {
    fn all(rows: Vec<Self>) -> Vec<Automation> {
        rows.into_iter().map(|w| w.0).collect()
    }
}

fn counter(row: &SqliteRow, column: &str) -> Result<u64, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    decode(u64::try_from(value))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let owner_id: uuid::Uuid = row.try_get("owner_id")?;
        let status: String = row.try_get("status")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let conditions_json: String = row.try_get("conditions")?;
        let actions_json: String = row.try_get("actions")?;
        let last_executed: Option<String> = row.try_get("last_executed")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Automation {
            id: AutomationId::from_uuid(id),
            owner_id: OwnerId::from_uuid(owner_id),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: decode(status.parse::<AutomationStatus>())?,
            trigger: parse_json(&trigger_json)?,
            conditions: parse_json(&conditions_json)?,
            actions: parse_json(&actions_json)?,
            stats: AutomationStats {
                execution_count: counter(row, "execution_count")?,
                success_count: counter(row, "success_count")?,
                failure_count: counter(row, "failure_count")?,
                last_executed: parse_optional_timestamp(last_executed.as_deref())?,
            },
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

/// JSON columns of an automation definition.
struct Definition {
    trigger: String,
    conditions: String,
    actions: String,
}

impl Definition {
    fn of(automation: &Automation) -> Result<Self, StorageError> {
        Ok(Self {
            trigger: serde_json::to_string(&automation.trigger)?,
            conditions: serde_json::to_string(&automation.conditions)?,
            actions: serde_json::to_string(&automation.actions)?,
        })
    }
}

const INSERT: &str = r"
    INSERT INTO automations (id, owner_id, name, description, status, trigger_type, trigger_data,
                             conditions, actions, execution_count, success_count, failure_count,
                             last_executed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM automations WHERE id = ?";

const FILTER: &str = r"
    WHERE owner_id = ?1
      AND (?2 IS NULL OR status = ?2)
      AND (?3 IS NULL OR trigger_type = ?3)
";

const SELECT_ACTIVE_BY_OWNER: &str = r"
    SELECT * FROM automations
    WHERE owner_id = ? AND status = 'active'
    ORDER BY created_at ASC, id ASC
";

const SELECT_ACTIVE_SCHEDULED: &str = r"
    SELECT * FROM automations
    WHERE status = 'active' AND trigger_type = 'scheduled'
    ORDER BY created_at ASC, id ASC
";

const UPDATE: &str = r"
    UPDATE automations
    SET name = ?, description = ?, status = ?, trigger_type = ?, trigger_data = ?,
        conditions = ?, actions = ?, updated_at = ?
    WHERE id = ?
";

const DELETE: &str = "DELETE FROM automations WHERE id = ?";

const RECORD_RUN: &str = r"
    UPDATE automations
    SET execution_count = execution_count + 1,
        success_count = success_count + ?,
        failure_count = failure_count + ?,
        last_executed = ?
    WHERE id = ?
";

/// `SQLite`-backed automation repository.
#[derive(Clone)]
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AutomationRepository for SqliteAutomationRepository {
    async fn create(&self, automation: Automation) -> Result<Automation, FunnelError> {
        let definition = Definition::of(&automation)?;
        let stats = automation.stats;

        sqlx::query(INSERT)
            .bind(automation.id.as_uuid())
            .bind(automation.owner_id.as_uuid())
            .bind(&automation.name)
            .bind(&automation.description)
            .bind(automation.status.as_str())
            .bind(automation.trigger.type_name())
            .bind(&definition.trigger)
            .bind(&definition.conditions)
            .bind(&definition.actions)
            .bind(i64::try_from(stats.execution_count).unwrap_or(i64::MAX))
            .bind(i64::try_from(stats.success_count).unwrap_or(i64::MAX))
            .bind(i64::try_from(stats.failure_count).unwrap_or(i64::MAX))
            .bind(stats.last_executed.map(timestamp))
            .bind(timestamp(automation.created_at))
            .bind(timestamp(automation.updated_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(automation)
    }

    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, FunnelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn list(&self, query: AutomationQuery) -> Result<Paginated<Automation>, FunnelError> {
        let status = query.status.map(AutomationStatus::as_str);
        let (limit, offset) = window(query.page);

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM automations {FILTER}"))
                .bind(query.owner_id.as_uuid())
                .bind(status)
                .bind(query.trigger_type.as_deref())
                .fetch_one(&self.pool)
                .await
                .map_err(StorageError::from)?;

        let rows: Vec<Wrapper> = sqlx::query_as(&format!(
            "SELECT * FROM automations {FILTER} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5"
        ))
        .bind(query.owner_id.as_uuid())
        .bind(status)
        .bind(query.trigger_type.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(Paginated::new(Wrapper::all(rows), total(count), query.page))
    }

    async fn find_active_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Automation>, FunnelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE_BY_OWNER)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::all(rows))
    }

    async fn find_active_scheduled(&self) -> Result<Vec<Automation>, FunnelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE_SCHEDULED)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::all(rows))
    }

    async fn update(&self, automation: Automation) -> Result<Automation, FunnelError> {
        let definition = Definition::of(&automation)?;
        let id = automation.id;

        let done = sqlx::query(UPDATE)
            .bind(&automation.name)
            .bind(&automation.description)
            .bind(automation.status.as_str())
            .bind(automation.trigger.type_name())
            .bind(&definition.trigger)
            .bind(&definition.conditions)
            .bind(&definition.actions)
            .bind(timestamp(automation.updated_at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let stored = if done.rows_affected() == 0 {
            None
        } else {
            self.get_by_id(id).await?
        };
        stored.ok_or_else(|| {
            NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn delete(&self, id: AutomationId) -> Result<bool, FunnelError> {
        let done = sqlx::query(DELETE)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(done.rows_affected() == 1)
    }

    async fn record_run(
        &self,
        id: AutomationId,
        success: bool,
        at: Timestamp,
    ) -> Result<(), FunnelError> {
        sqlx::query(RECORD_RUN)
            .bind(i64::from(success))
            .bind(i64::from(!success))
            .bind(timestamp(at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory_pool;
    use chrono::{Duration, TimeZone, Utc};
    use funnelhub_domain::automation::{
        Action, ActionKind, Condition, EntityScope, Frequency, Operator, Schedule, TimeOfDay,
        Trigger, TriggerEvent,
    };

    async fn setup() -> SqliteAutomationRepository {
        SqliteAutomationRepository::new(memory_pool().await)
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn on_new_lead(owner: OwnerId, status: AutomationStatus, created_at: Timestamp) -> Automation {
        Automation::builder()
            .owner_id(owner)
            .name("Hot website leads")
            .status(status)
            .trigger(Trigger::Event {
                event: TriggerEvent::NewLead,
                entity_type: EntityScope::Lead,
            })
            .condition(Condition::new("source", Operator::Equals, "website"))
            .action(Action::new(ActionKind::AddTag {
                tags: vec!["hot".into()],
            }))
            .action(
                Action::new(ActionKind::SendEmail {
                    template_id: "welcome".into(),
                })
                .delayed(30),
            )
            .created_at(created_at)
            .build()
            .unwrap()
    }

    fn daily(owner: OwnerId) -> Automation {
        Automation::builder()
            .owner_id(owner)
            .name("Daily digest")
            .status(AutomationStatus::Active)
            .trigger(Trigger::Scheduled {
                entity_type: EntityScope::Both,
                schedule: Schedule {
                    frequency: Frequency::Daily,
                    day_of_week: None,
                    day_of_month: None,
                    time: TimeOfDay { hour: 9, minute: 0 },
                },
            })
            .action(Action::new(ActionKind::AddTag {
                tags: vec!["digest".into()],
            }))
            .created_at(now())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_preserve_definition_through_roundtrip() {
        let repo = setup().await;
        let auto = on_new_lead(OwnerId::new(), AutomationStatus::Draft, now());

        repo.create(auto.clone()).await.unwrap();
        let fetched = repo.get_by_id(auto.id).await.unwrap().unwrap();

        assert_eq!(fetched, auto);
    }

    #[tokio::test]
    async fn should_return_none_when_automation_not_found() {
        let repo = setup().await;

        assert!(repo.get_by_id(AutomationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_find_only_active_automations_of_owner_oldest_first() {
        let repo = setup().await;
        let owner = OwnerId::new();
        let second = on_new_lead(owner, AutomationStatus::Active, now() + Duration::minutes(1));
        let first = on_new_lead(owner, AutomationStatus::Active, now());
        repo.create(second.clone()).await.unwrap();
        repo.create(first.clone()).await.unwrap();
        repo.create(on_new_lead(owner, AutomationStatus::Paused, now()))
            .await
            .unwrap();
        repo.create(on_new_lead(OwnerId::new(), AutomationStatus::Active, now()))
            .await
            .unwrap();

        let active = repo.find_active_by_owner(owner).await.unwrap();
        let ids: Vec<AutomationId> = active.iter().map(|a| a.id).collect();

        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn should_find_active_scheduled_across_owners() {
        let repo = setup().await;
        let scheduled = daily(OwnerId::new());
        repo.create(scheduled.clone()).await.unwrap();
        repo.create(on_new_lead(OwnerId::new(), AutomationStatus::Active, now()))
            .await
            .unwrap();

        let found = repo.find_active_scheduled().await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scheduled.id);
    }

    #[tokio::test]
    async fn should_count_runs_atomically() {
        let repo = setup().await;
        let auto = on_new_lead(OwnerId::new(), AutomationStatus::Active, now());
        repo.create(auto.clone()).await.unwrap();

        repo.record_run(auto.id, true, now()).await.unwrap();
        repo.record_run(auto.id, false, now() + Duration::hours(1))
            .await
            .unwrap();

        let stats = repo.get_by_id(auto.id).await.unwrap().unwrap().stats;
        assert_eq!(stats.execution_count, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.last_executed, Some(now() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn should_keep_stats_when_definition_updated() {
        let repo = setup().await;
        let auto = on_new_lead(OwnerId::new(), AutomationStatus::Draft, now());
        repo.create(auto.clone()).await.unwrap();
        repo.record_run(auto.id, true, now()).await.unwrap();

        let mut edited = auto.clone();
        edited.name = "Renamed".into();
        edited.status = AutomationStatus::Active;
        let updated = repo.update(edited).await.unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.status, AutomationStatus::Active);
        assert_eq!(updated.stats.execution_count, 1);
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_missing_automation() {
        let repo = setup().await;

        let err = repo
            .update(on_new_lead(OwnerId::new(), AutomationStatus::Draft, now()))
            .await
            .unwrap_err();

        assert!(matches!(err, FunnelError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_filter_list_by_trigger_type() {
        let repo = setup().await;
        let owner = OwnerId::new();
        repo.create(daily(owner)).await.unwrap();
        repo.create(on_new_lead(owner, AutomationStatus::Draft, now()))
            .await
            .unwrap();

        let scheduled = repo
            .list(AutomationQuery {
                trigger_type: Some("scheduled".into()),
                ..AutomationQuery::for_owner(owner)
            })
            .await
            .unwrap();
        let drafts = repo
            .list(AutomationQuery {
                status: Some(AutomationStatus::Draft),
                ..AutomationQuery::for_owner(owner)
            })
            .await
            .unwrap();

        assert_eq!(scheduled.total, 1);
        assert_eq!(scheduled.items[0].name, "Daily digest");
        assert_eq!(drafts.total, 1);
        assert_eq!(drafts.items[0].name, "Hot website leads");
    }

    #[tokio::test]
    async fn should_delete_automation() {
        let repo = setup().await;
        let auto = on_new_lead(OwnerId::new(), AutomationStatus::Draft, now());
        repo.create(auto.clone()).await.unwrap();

        assert!(repo.delete(auto.id).await.unwrap());
        assert!(!repo.delete(auto.id).await.unwrap());
    }
}
