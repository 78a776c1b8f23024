//! Task CRUD endpoints under `/api/tasks`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tasklet_core::domain::TaskId;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::api::task::{
    CreateTaskRequest, TaskListQuery, TaskListResponse, TaskResponse, UpdateTaskRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, list_deleted_tasks, get_task, create_task, update_task, patch_task, delete_task),
    components(schemas(
        TaskResponse,
        TaskListResponse,
        CreateTaskRequest,
        UpdateTaskRequest,
        tasklet_core::domain::TaskStatus
    ))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/deleted", get(list_deleted_tasks))
        .route(
            "/tasks/{id}",
            get(get_task)
                .put(update_task)
                .patch(patch_task)
                .delete(delete_task),
        )
}

fn not_found(id: i64) -> ServerError {
    ServerError::NotFound(format!("task {id} not found"))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "One page of live tasks", body = TaskListResponse),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskListQuery>,
) -> Result<Json<TaskListResponse>, ServerError> {
    let page = state
        .tasks
        .list(
            q.page_number.unwrap_or(1),
            q.page_size.unwrap_or(tasklet_core::domain::DEFAULT_PAGE_SIZE),
            q.search.as_deref(),
        )
        .await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/api/tasks/deleted",
    tag = "tasks",
    responses(
        (status = 200, description = "Soft-deleted tasks, most recently deleted first", body = [TaskResponse]),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_deleted_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TaskResponse>>, ServerError> {
    let records = state.tasks.list_deleted().await?;
    Ok(Json(records.into_iter().map(TaskResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task found", body = TaskResponse),
        (status = 404, description = "No live task with this id"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, ServerError> {
    let record = state
        .tasks
        .get(TaskId::new(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    params(
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; a repeat on this route within the TTL is rejected with 409")
    ),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Missing idempotency key or invalid body"),
        (status = 409, description = "Duplicate idempotency key"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ServerError> {
    req.validate()?;
    let record = state.tasks.create(req.into()).await?;
    let location = format!("/api/tasks/{}", record.id());
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(TaskResponse::from(record)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task id"),
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; a repeat on this route within the TTL is rejected with 409")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Missing idempotency key or invalid body"),
        (status = 404, description = "No live task with this id"),
        (status = 409, description = "Duplicate idempotency key"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ServerError> {
    req.validate()?;
    let record = state
        .tasks
        .update(TaskId::new(id), req.into())
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(record.into()))
}

/// Same merge semantics as `PUT`; both only touch the fields that are sent.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = i64, Path, description = "Task id"),
        ("Idempotency-Key" = String, Header, description = "Client-chosen key; a repeat on this route within the TTL is rejected with 409")
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Missing idempotency key or invalid body"),
        (status = 404, description = "No live task with this id"),
        (status = 409, description = "Duplicate idempotency key"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn patch_task(
    state: State<Arc<AppState>>,
    id: Path<i64>,
    req: Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ServerError> {
    update_task(state, id, req).await
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task soft-deleted"),
        (status = 404, description = "No live task with this id"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    if state.tasks.soft_delete(TaskId::new(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
