use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tasklet_core::domain::{NewTask, TaskPatch, TaskRecord, TaskStatus};
use tasklet_core::services::TaskPage;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Query string of `GET /api/tasks`. Missing values take the service defaults.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// 1-based page number (default 1, values below 1 become 1).
    pub page_number: Option<i64>,
    /// Items per page (default 10, clamped to 1..=100).
    pub page_size: Option<i64>,
    /// Substring matched against title or description.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<TaskRecord> for TaskResponse {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id().get(),
            created_at: record.created_at(),
            title: record.title,
            description: record.description,
            status: record.status,
            due_date: record.due_date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub page_number: i64,
    pub page_size: i64,
    pub items: Vec<TaskResponse>,
    /// Number of live tasks matching the filter, across all pages.
    pub total: i64,
}

impl From<TaskPage> for TaskListResponse {
    fn from(page: TaskPage) -> Self {
        Self {
            page_number: page.page_number,
            page_size: page.page_size,
            items: page.items.into_iter().map(TaskResponse::from).collect(),
            total: page.total,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "title must be at most 200 characters")
    )]
    pub title: String,
    #[validate(length(
        max = 2000,
        message = "description must be at most 2000 characters"
    ))]
    pub description: Option<String>,
    #[validate(custom(function = "in_future"))]
    pub due_date: Option<DateTime<Utc>>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
        }
    }
}

/// Body of `PUT`/`PATCH /api/tasks/{id}`.
///
/// Omitted fields are left alone. `description` and `dueDate` may also be sent
/// as `null` to clear them.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "title must be at most 200 characters")
    )]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, nullable)]
    #[validate(length(
        max = 2000,
        message = "description must be at most 2000 characters"
    ))]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateTaskRequest> for TaskPatch {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskPatch {
            title: req.title,
            description: req.description,
            status: req.status,
            due_date: req.due_date,
        }
    }
}

// ── validators ───────────────────────────────────────────────────────────────

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("title must not be blank".into()));
    }
    Ok(())
}

fn in_future(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *value <= Utc::now() {
        return Err(
            ValidationError::new("past").with_message("due date must be in the future".into()),
        );
    }
    Ok(())
}

/// Present-but-null becomes `Some(None)`; a missing field stays `None` via `default`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
