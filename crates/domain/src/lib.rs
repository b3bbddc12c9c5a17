//! # funnelhub-domain
//!
//! Pure domain model for the funnelhub task scheduler and automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Records** (leads and contacts) with dotted-path field access
//! - Define **Values** and every coercion rule used to compare them
//! - Define **Tasks** and their `pending → in_progress → terminal` lifecycle
//! - Define **Automations** (trigger → condition → action rules)
//! - Define **Events** (record lifecycle changes that feed automations)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod page;
pub mod time;
pub mod value;

pub mod automation;
pub mod event;
pub mod record;
pub mod task;
