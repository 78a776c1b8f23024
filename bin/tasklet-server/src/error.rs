//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body with an
//! appropriate status code.
//!
//! Database errors are logged in full, but the caller only sees a generic
//! message so SQL and file paths never leak.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tasklet_core::idempotency::GuardRejection;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the task store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body parsed but failed field validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Same idempotency key seen again for the same route.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },
}

impl From<GuardRejection> for ServerError {
    fn from(rejection: GuardRejection) -> Self {
        match rejection {
            GuardRejection::MissingKey => ServerError::BadRequest(rejection.to_string()),
            GuardRejection::Duplicate => ServerError::Conflict(rejection.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::Validation(errors) => {
                let body = json!({
                    "error": "validation failed",
                    "fields": field_messages(errors),
                });
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            ServerError::TooManyRequests { retry_after_secs } => {
                let body = json!({
                    "error": "rate limit exceeded",
                    "retry_after_seconds": retry_after_secs,
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(http::header::RETRY_AFTER, retry_after_secs.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

/// Field name → human-readable messages, sorted for stable output.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use validator::ValidationError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn database_errors_are_masked() {
        let response = ServerError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "internal server error");
    }

    #[tokio::test]
    async fn guard_rejections_map_to_400_and_409() {
        let missing = ServerError::from(GuardRejection::MissingKey).into_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let duplicate = ServerError::from(GuardRejection::Duplicate).into_response();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "title",
            ValidationError::new("blank").with_message("title must not be blank".into()),
        );
        let response = ServerError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["fields"]["title"][0], "title must not be blank");
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let response = ServerError::TooManyRequests { retry_after_secs: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[http::header::RETRY_AFTER], "12");
    }
}
