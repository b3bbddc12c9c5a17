//! JSON handlers for automations.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use funnelhub_app::ports::{
    AutomationQuery, AutomationRepository, EventPublisher, RecordRepository, TaskRepository,
};
use funnelhub_app::services::automation_service::AutomationDraft;
use funnelhub_domain::automation::{Action, Automation, AutomationStatus, Condition, Trigger};
use funnelhub_domain::id::AutomationId;
use funnelhub_domain::page::{Page, Paginated};

use crate::error::ApiError;
use crate::extract::{Owner, parse_id};
use crate::state::AppState;

/// Query string of `GET /api/automations`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    pub trigger_type: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Request body for creating or replacing an automation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<AutomationStatus>,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl From<AutomationRequest> for AutomationDraft {
    fn from(req: AutomationRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            status: req.status,
            trigger: req.trigger,
            conditions: req.conditions,
            actions: req.actions,
        }
    }
}

/// Possible responses from the automation endpoints.
pub enum AutomationResponse {
    Ok(Json<Automation>),
    Created(Json<Automation>),
    List(Json<Paginated<Automation>>),
    NoContent,
}

impl IntoResponse for AutomationResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::List(json) => json.into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/automations` — filter by `status` and `triggerType`.
pub async fn list<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Query(params): Query<ListParams>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let status = params
        .status
        .as_deref()
        .map(str::parse::<AutomationStatus>)
        .transpose()?;
    let query = AutomationQuery {
        status,
        trigger_type: params.trigger_type,
        page: Page::new(params.page, params.limit)?,
        ..AutomationQuery::for_owner(owner_id)
    };
    let page = state.automation_service.list(query).await?;
    Ok(AutomationResponse::List(Json(page)))
}

/// `GET /api/automations/{id}`
pub async fn get<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let automation_id: AutomationId = parse_id(&id)?;
    let automation = state.automation_service.get(owner_id, automation_id).await?;
    Ok(AutomationResponse::Ok(Json(automation)))
}

/// `POST /api/automations` — create a new automation (draft unless told otherwise).
pub async fn create<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Json(req): Json<AutomationRequest>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let created = state
        .automation_service
        .create(owner_id, req.into())
        .await?;
    Ok(AutomationResponse::Created(Json(created)))
}

/// `PUT /api/automations/{id}` — replace the definition, keeping stats.
pub async fn update<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    Json(req): Json<AutomationRequest>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let automation_id: AutomationId = parse_id(&id)?;
    let updated = state
        .automation_service
        .update(owner_id, automation_id, req.into())
        .await?;
    Ok(AutomationResponse::Ok(Json(updated)))
}

/// `POST /api/automations/{id}/activate`
pub async fn activate<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let automation_id: AutomationId = parse_id(&id)?;
    let automation = state
        .automation_service
        .activate(owner_id, automation_id)
        .await?;
    Ok(AutomationResponse::Ok(Json(automation)))
}

/// `POST /api/automations/{id}/pause`
pub async fn pause<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let automation_id: AutomationId = parse_id(&id)?;
    let automation = state.automation_service.pause(owner_id, automation_id).await?;
    Ok(AutomationResponse::Ok(Json(automation)))
}

/// `DELETE /api/automations/{id}`
pub async fn delete<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<AutomationResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let automation_id: AutomationId = parse_id(&id)?;
    state
        .automation_service
        .delete(owner_id, automation_id)
        .await?;
    Ok(AutomationResponse::NoContent)
}
