//! `SQLite` implementation of [`RecordRepository`].
//!
//! Records keep their full shape in a JSON `data` column; the indexed
//! columns only exist for filtering and ordering.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use funnelhub_app::ports::{RecordQuery, RecordRepository};
use funnelhub_domain::error::{FunnelError, NotFoundError};
use funnelhub_domain::id::{OwnerId, RecordId};
use funnelhub_domain::page::Paginated;
use funnelhub_domain::record::{Record, RecordKind};

use crate::columns::{parse_json, timestamp, total, window};
use crate::error::StorageError;

struct Wrapper(Record);

impl Wrapper {
    fn all(rows: Vec<Self>) -> Vec<Record> {
        rows.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let data: String = row.try_get("data")?;
        parse_json(&data).map(Self)
    }
}

const INSERT: &str = r"
    INSERT INTO records (id, owner_id, kind, data, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM records WHERE id = ?";

const UPDATE: &str = "UPDATE records SET data = ?, updated_at = ? WHERE id = ?";

const FILTER: &str = "WHERE owner_id = ?1 AND (?2 IS NULL OR kind = ?2)";

/// `SQLite`-backed lead and contact repository.
#[derive(Clone)]
pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RecordRepository for SqliteRecordRepository {
    async fn create(&self, record: Record) -> Result<Record, FunnelError> {
        let data = serde_json::to_string(&record).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(record.id().as_uuid())
            .bind(record.owner_id().as_uuid())
            .bind(record.kind().as_str())
            .bind(&data)
            .bind(timestamp(record.created_at()))
            .bind(timestamp(record.updated_at()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(record)
    }

    async fn get_by_id(&self, id: RecordId) -> Result<Option<Record>, FunnelError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(&self, record: Record) -> Result<Record, FunnelError> {
        let data = serde_json::to_string(&record).map_err(StorageError::from)?;

        let done = sqlx::query(UPDATE)
            .bind(&data)
            .bind(timestamp(record.updated_at()))
            .bind(record.id().as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if done.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Record",
                id: record.id().to_string(),
            }
            .into());
        }
        Ok(record)
    }

    async fn list(&self, query: RecordQuery) -> Result<Paginated<Record>, FunnelError> {
        let kind = query.kind.map(RecordKind::as_str);
        let (limit, offset) = window(query.page);

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM records {FILTER}"))
            .bind(query.owner_id.as_uuid())
            .bind(kind)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let rows: Vec<Wrapper> = sqlx::query_as(&format!(
            "SELECT * FROM records {FILTER} ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
        ))
        .bind(query.owner_id.as_uuid())
        .bind(kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(Paginated::new(Wrapper::all(rows), total(count), query.page))
    }

    async fn find_by_owner(
        &self,
        owner_id: OwnerId,
        kind: Option<RecordKind>,
    ) -> Result<Vec<Record>, FunnelError> {
        let rows: Vec<Wrapper> = sqlx::query_as(&format!(
            "SELECT * FROM records {FILTER} ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id.as_uuid())
        .bind(kind.map(RecordKind::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(Wrapper::all(rows))
    }
}
