//! JSON handlers for leads and contacts.
//!
//! Every mutation here goes through the record service, which publishes
//! the matching record event for the automation engine.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use funnelhub_app::ports::{
    AutomationRepository, EventPublisher, RecordQuery, RecordRepository, TaskRepository,
};
use funnelhub_domain::id::{OwnerId, RecordId};
use funnelhub_domain::page::{Page, Paginated};
use funnelhub_domain::record::{Contact, Lead, Profile, Record, RecordKind};
use funnelhub_domain::value::Value;

use crate::error::ApiError;
use crate::extract::{Owner, parse_id};
use crate::state::AppState;

/// Query string of the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Request body for creating a contact.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[serde(flatten)]
    pub profile: Profile,
    pub job_title: Option<String>,
}

/// Request body for the tag endpoints.
#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

/// Both sides of a lead conversion.
#[derive(Debug, Serialize)]
pub struct ConversionBody {
    pub lead: Lead,
    pub contact: Contact,
}

/// Possible responses from the record endpoints.
pub enum RecordResponse {
    Ok(Json<Record>),
    Created(Json<Record>),
    List(Json<Paginated<Record>>),
    Converted(Json<ConversionBody>),
}

impl IntoResponse for RecordResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::List(json) => json.into_response(),
            Self::Converted(json) => json.into_response(),
        }
    }
}

async fn list_kind<TR, AR, RR, EP>(
    state: &AppState<TR, AR, RR, EP>,
    owner_id: OwnerId,
    kind: RecordKind,
    params: ListParams,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let query = RecordQuery {
        owner_id,
        kind: Some(kind),
        page: Page::new(params.page, params.limit)?,
    };
    let page = state.record_service.list(query).await?;
    Ok(RecordResponse::List(Json(page)))
}

/// `GET /api/leads`
pub async fn list_leads<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Query(params): Query<ListParams>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    list_kind(&state, owner_id, RecordKind::Lead, params).await
}

/// `GET /api/contacts`
pub async fn list_contacts<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Query(params): Query<ListParams>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    list_kind(&state, owner_id, RecordKind::Contact, params).await
}

/// `POST /api/leads` — publishes `new_lead`.
pub async fn create_lead<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Json(profile): Json<Profile>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let lead = state.record_service.create_lead(owner_id, profile).await?;
    Ok(RecordResponse::Created(Json(lead)))
}

/// `POST /api/contacts` — publishes `new_contact`.
pub async fn create_contact<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Json(req): Json<CreateContactRequest>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let contact = state
        .record_service
        .create_contact(owner_id, req.profile, req.job_title)
        .await?;
    Ok(RecordResponse::Created(Json(contact)))
}

/// `GET /api/records/{id}`
pub async fn get<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let record_id: RecordId = parse_id(&id)?;
    let record = state.record_service.get(owner_id, record_id).await?;
    Ok(RecordResponse::Ok(Json(record)))
}

/// `PATCH /api/records/{id}` — body maps dotted field paths to values.
pub async fn update<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    Json(fields): Json<BTreeMap<String, Value>>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let record_id: RecordId = parse_id(&id)?;
    let record = state
        .record_service
        .update_fields(owner_id, record_id, fields)
        .await?;
    Ok(RecordResponse::Ok(Json(record)))
}

/// `POST /api/records/{id}/tags`
pub async fn add_tags<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let record_id: RecordId = parse_id(&id)?;
    let record = state
        .record_service
        .add_tags(owner_id, record_id, req.tags)
        .await?;
    Ok(RecordResponse::Ok(Json(record)))
}

/// `DELETE /api/records/{id}/tags`
pub async fn remove_tags<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let record_id: RecordId = parse_id(&id)?;
    let record = state
        .record_service
        .remove_tags(owner_id, record_id, req.tags)
        .await?;
    Ok(RecordResponse::Ok(Json(record)))
}

/// `POST /api/leads/{id}/convert` — publishes `new_contact`.
pub async fn convert<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<RecordResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let record_id: RecordId = parse_id(&id)?;
    let conversion = state
        .record_service
        .convert_lead(owner_id, record_id)
        .await?;
    Ok(RecordResponse::Converted(Json(ConversionBody {
        lead: conversion.lead,
        contact: conversion.contact,
    })))
}
