//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod automations;
#[allow(clippy::missing_errors_doc)]
pub mod records;
#[allow(clippy::missing_errors_doc)]
pub mod tasks;

use axum::Router;
use axum::routing::{get, post};

use funnelhub_app::ports::{AutomationRepository, EventPublisher, RecordRepository, TaskRepository};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<TR, AR, RR, EP>() -> Router<AppState<TR, AR, RR, EP>>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    Router::new()
        // Tasks
        .route(
            "/tasks",
            get(tasks::list::<TR, AR, RR, EP>).post(tasks::create::<TR, AR, RR, EP>),
        )
        .route(
            "/tasks/{id}",
            get(tasks::get::<TR, AR, RR, EP>).delete(tasks::delete::<TR, AR, RR, EP>),
        )
        // Automations
        .route(
            "/automations",
            get(automations::list::<TR, AR, RR, EP>)
                .post(automations::create::<TR, AR, RR, EP>),
        )
        .route(
            "/automations/{id}",
            get(automations::get::<TR, AR, RR, EP>)
                .put(automations::update::<TR, AR, RR, EP>)
                .delete(automations::delete::<TR, AR, RR, EP>),
        )
        .route(
            "/automations/{id}/activate",
            post(automations::activate::<TR, AR, RR, EP>),
        )
        .route(
            "/automations/{id}/pause",
            post(automations::pause::<TR, AR, RR, EP>),
        )
        // Records
        .route(
            "/leads",
            get(records::list_leads::<TR, AR, RR, EP>)
                .post(records::create_lead::<TR, AR, RR, EP>),
        )
        .route(
            "/leads/{id}/convert",
            post(records::convert::<TR, AR, RR, EP>),
        )
        .route(
            "/contacts",
            get(records::list_contacts::<TR, AR, RR, EP>)
                .post(records::create_contact::<TR, AR, RR, EP>),
        )
        .route(
            "/records/{id}",
            get(records::get::<TR, AR, RR, EP>).patch(records::update::<TR, AR, RR, EP>),
        )
        .route(
            "/records/{id}/tags",
            post(records::add_tags::<TR, AR, RR, EP>)
                .delete(records::remove_tags::<TR, AR, RR, EP>),
        )
}
