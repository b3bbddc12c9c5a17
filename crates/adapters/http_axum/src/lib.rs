//! # funnelhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** over tasks, automations, leads and contacts
//!   (`/api/tasks`, `/api/automations`, `/api/leads`, …)
//! - Resolve the tenant from the `X-Owner-Id` header
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `funnelhub-app` (for port traits and services) and
//! `funnelhub-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod extract;
pub mod router;
pub mod state;
