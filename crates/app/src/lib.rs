//! # funnelhub-app
//!
//! Application layer — use-cases, background processing and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `TaskRepository` — the persistent task queue
//!   - `AutomationRepository` — CRUD for automations plus run statistics
//!   - `RecordRepository` — CRUD for leads and contacts
//!   - `Mailer`, `LeadConverter`, `WebhookClient` — action collaborators
//!   - `EventPublisher` — record lifecycle events
//! - Define **driving/inbound ports** as use-case structs:
//!   - `TaskService`, `AutomationService`, `RecordService`
//! - Run the engine: `Dispatcher` for due tasks, `AutomationEngine` for
//!   event and schedule triggers, `Runtime` for the loops that drive both
//! - Provide **in-process infrastructure** (event bus, clock) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `funnelhub-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod action_executor;
pub mod automation_engine;
pub mod clock;
pub mod dispatcher;
pub mod event_bus;
pub mod ports;
pub mod runtime;
pub mod services;
pub mod task_handler;

#[cfg(test)]
mod testing;
