//! # funnelhub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `funnelhub-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Task claims and automation counters are single conditional SQL
//! statements, so concurrent writers never double-claim or lose counts.
//!
//! ## Dependency rule
//! Depends on `funnelhub-app` (for port traits) and `funnelhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod automation_repo;
mod columns;
mod error;
mod pool;
mod record_repo;
mod task_repo;

pub use automation_repo::SqliteAutomationRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use record_repo::SqliteRecordRepository;
pub use task_repo::SqliteTaskRepository;
