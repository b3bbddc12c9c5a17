//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.
//! Every operation is scoped to one owner: records of another owner are
//! reported as not found.

pub mod automation_service;
pub mod record_service;
pub mod task_service;
