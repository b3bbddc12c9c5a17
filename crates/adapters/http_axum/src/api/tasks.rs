//! JSON handlers for the task queue.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use funnelhub_app::ports::{
    AutomationRepository, EventPublisher, RecordRepository, TaskQuery, TaskRepository,
};
use funnelhub_app::services::task_service::NewTask;
use funnelhub_domain::id::TaskId;
use funnelhub_domain::page::{Page, Paginated};
use funnelhub_domain::task::{Payload, Task, TaskStatus};
use funnelhub_domain::time::Timestamp;

use crate::error::ApiError;
use crate::extract::{Owner, parse_id};
use crate::state::AppState;

/// Query string of `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Request body for enqueueing a task.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub payload: Payload,
    pub priority: Option<i64>,
    pub scheduled_for: Option<Timestamp>,
}

/// Possible responses from the task endpoints.
pub enum TaskResponse {
    Ok(Json<Task>),
    Created(Json<Task>),
    List(Json<Paginated<Task>>),
    NoContent,
}

impl IntoResponse for TaskResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::List(json) => json.into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/tasks` — one page of the owner's tasks, newest first.
pub async fn list<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Query(params): Query<ListParams>,
) -> Result<TaskResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let query = TaskQuery {
        status,
        task_type: params.task_type,
        page: Page::new(params.page, params.limit)?,
        ..TaskQuery::for_owner(owner_id)
    };
    let page = state.task_service.list(query).await?;
    Ok(TaskResponse::List(Json(page)))
}

/// `GET /api/tasks/{id}`
pub async fn get<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<TaskResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let task_id: TaskId = parse_id(&id)?;
    let task = state.task_service.get(owner_id, task_id).await?;
    Ok(TaskResponse::Ok(Json(task)))
}

/// `POST /api/tasks` — enqueue a task.
pub async fn create<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Json(req): Json<CreateTaskRequest>,
) -> Result<TaskResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let task = state
        .task_service
        .enqueue(
            owner_id,
            NewTask {
                task_type: req.task_type,
                payload: req.payload,
                priority: req.priority,
                scheduled_for: req.scheduled_for,
            },
        )
        .await?;
    Ok(TaskResponse::Created(Json(task)))
}

/// `DELETE /api/tasks/{id}` — fails with 409 while the task is running.
pub async fn delete<TR, AR, RR, EP>(
    State(state): State<AppState<TR, AR, RR, EP>>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<TaskResponse, ApiError>
where
    TR: TaskRepository + 'static,
    AR: AutomationRepository + 'static,
    RR: RecordRepository + Clone + 'static,
    EP: EventPublisher + 'static,
{
    let task_id: TaskId = parse_id(&id)?;
    state.task_service.delete(owner_id, task_id).await?;
    Ok(TaskResponse::NoContent)
}
