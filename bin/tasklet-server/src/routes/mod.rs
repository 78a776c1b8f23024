//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (trace id, CORS, rate limit, idempotency guard)
//! - optional Swagger UI / OpenAPI document (disable with `TASKLET_ENABLE_SWAGGER=false`)
//! - health route
//! - task routes under `/api`

mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::idempotency::idempotency_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    // Each `.layer` wraps the previous ones, so the last added runs first.
    app.layer(middleware::from_fn_with_state(
        state.clone(),
        idempotency_middleware,
    ))
    .layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ))
    .layer(cors::cors_layer(&state.config))
    .layer(middleware::from_fn(trace::trace_middleware))
    .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{HeaderValue, Method, Request, StatusCode, header};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tasklet_core::entities::SqliteStore;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::middleware::trace::X_TRACE_ID;

    async fn app_with(config: Config) -> Router {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        build(Arc::new(AppState::new(config, store)))
    }

    async fn app() -> Router {
        app_with(Config {
            rate_limit_per_minute: 0,
            ..Config::default()
        })
        .await
    }

    fn request(method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("Idempotency-Key", key);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(app: &Router, key: &str, body: Value) -> Value {
        let response = send(app, request(Method::POST, "/api/tasks", Some(key), Some(body))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn health_is_ok_without_key() {
        let app = app().await;
        let response = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn create_returns_201_with_location_and_defaults() {
        let app = app().await;
        let response = send(
            &app,
            request(Method::POST, "/api/tasks", Some("k1"), Some(json!({ "title": "Buy milk" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_owned();
        let body = body_json(response).await;
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["title"], "Buy milk");
        assert_eq!(location, format!("/api/tasks/{}", body["id"]));
        assert!(body.get("deletedAt").is_none());

        let fetched = send(&app, request(Method::GET, &location, None, None)).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await, body);
    }

    #[tokio::test]
    async fn write_without_key_is_rejected_before_the_handler() {
        let app = app().await;
        let response = send(
            &app,
            request(Method::POST, "/api/tasks", None, Some(json!({ "title": "x" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let blank = send(
            &app,
            request(Method::POST, "/api/tasks", Some("  "), Some(json!({ "title": "x" }))),
        )
        .await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let list = send(&app, request(Method::GET, "/api/tasks", None, None)).await;
        assert_eq!(body_json(list).await["total"], 0);
    }

    #[tokio::test]
    async fn repeated_key_is_409_regardless_of_case() {
        let app = app().await;
        create(&app, "order-abc", json!({ "title": "once" })).await;

        let again = send(
            &app,
            request(Method::POST, "/api/tasks", Some("ORDER-ABC"), Some(json!({ "title": "twice" }))),
        )
        .await;
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let list = send(&app, request(Method::GET, "/api/tasks", None, None)).await;
        assert_eq!(body_json(list).await["total"], 1);
    }

    #[tokio::test]
    async fn non_ascii_key_is_admitted_then_duplicate() {
        let app = app().await;
        let post = || {
            Request::builder()
                .method(Method::POST)
                .uri("/api/tasks")
                .header("Idempotency-Key", HeaderValue::from_bytes("ключ".as_bytes()).unwrap())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "title": "unicode" }).to_string()))
                .unwrap()
        };

        assert_eq!(send(&app, post()).await.status(), StatusCode::CREATED);
        assert_eq!(send(&app, post()).await.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn concurrent_duplicates_forward_exactly_one() {
        let app = app().await;
        let body = json!({ "title": "race" });
        let (a, b) = tokio::join!(
            send(&app, request(Method::POST, "/api/tasks", Some("same"), Some(body.clone()))),
            send(&app, request(Method::POST, "/api/tasks", Some("same"), Some(body.clone()))),
        );
        let mut statuses = [a.status(), b.status()];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

        let list = send(&app, request(Method::GET, "/api/tasks", None, None)).await;
        assert_eq!(body_json(list).await["total"], 1);
    }

    #[tokio::test]
    async fn invalid_body_is_400_with_fields() {
        let app = app().await;
        let response = send(
            &app,
            request(Method::POST, "/api/tasks", Some("k"), Some(json!({ "title": "  " }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["fields"]["title"].is_array());
    }

    #[tokio::test]
    async fn list_normalizes_paging_and_filters() {
        let app = app().await;
        create(&app, "a", json!({ "title": "Buy milk" })).await;
        create(&app, "b", json!({ "title": "Walk dog" })).await;

        let response = send(
            &app,
            request(Method::GET, "/api/tasks?pageNumber=0&pageSize=500", None, None),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["pageNumber"], 1);
        assert_eq!(body["pageSize"], 100);
        assert_eq!(body["total"], 2);
        // Newest first.
        assert_eq!(body["items"][0]["title"], "Walk dog");

        let response = send(&app, request(Method::GET, "/api/tasks?search=MILK", None, None)).await;
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["pageSize"], 10);
        assert_eq!(body["items"][0]["title"], "Buy milk");
    }

    #[tokio::test]
    async fn patch_merges_only_sent_fields() {
        let app = app().await;
        let created = create(
            &app,
            "c",
            json!({ "title": "taxes", "description": "before april" }),
        )
        .await;
        let uri = format!("/api/tasks/{}", created["id"]);

        let response = send(
            &app,
            request(Method::PATCH, &uri, Some("p1"), Some(json!({ "status": "Done" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "Done");
        assert_eq!(body["title"], "taxes");
        assert_eq!(body["description"], "before april");
        assert_eq!(body["createdAt"], created["createdAt"]);

        let response = send(
            &app,
            request(Method::PUT, &uri, Some("p2"), Some(json!({ "description": null }))),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["description"], Value::Null);
        assert_eq!(body["status"], "Done");
    }

    #[tokio::test]
    async fn update_of_missing_task_is_404() {
        let app = app().await;
        let response = send(
            &app,
            request(Method::PUT, "/api/tasks/999", Some("k"), Some(json!({ "title": "x" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_soft_deletes_and_hides() {
        let app = app().await;
        let created = create(&app, "d", json!({ "title": "old idea" })).await;
        let uri = format!("/api/tasks/{}", created["id"]);

        // DELETE is not guarded, so no key is needed.
        let response = send(&app, request(Method::DELETE, &uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request(Method::GET, "/api/tasks/deleted", None, None)).await;
        let deleted = body_json(response).await;
        assert_eq!(deleted.as_array().map(Vec::len), Some(1));
        assert_eq!(deleted[0]["id"], created["id"]);

        let response = send(&app, request(Method::DELETE, &uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let app = app_with(Config {
            rate_limit_per_minute: 2,
            ..Config::default()
        })
        .await;
        for _ in 0..2 {
            let response = send(&app, request(Method::GET, "/health", None, None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn rate_limited_write_does_not_consume_key() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let config = Config {
            rate_limit_per_minute: 1,
            ..Config::default()
        };
        let state = Arc::new(AppState::new(config, store));
        let app = build(Arc::clone(&state));

        send(&app, request(Method::GET, "/health", None, None)).await;
        let response = send(
            &app,
            request(Method::POST, "/api/tasks", Some("k"), Some(json!({ "title": "x" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(state.guard.store().is_empty());
    }

    #[tokio::test]
    async fn trace_id_is_echoed() {
        let app = app().await;
        let id = "6f1d7c4e-9a57-4d4b-8a44-54a3c1e8c0aa";
        let req = Request::builder()
            .uri("/health")
            .header(X_TRACE_ID, id)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.headers()[X_TRACE_ID], id);
    }

    #[tokio::test]
    async fn openapi_documents_idempotency_header() {
        let app = app().await;
        let response = send(&app, request(Method::GET, "/api-docs/openapi.json", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        let params = &doc["paths"]["/api/tasks"]["post"]["parameters"];
        assert!(
            params
                .as_array()
                .is_some_and(|ps| ps.iter().any(|p| p["name"] == "Idempotency-Key"))
        );
    }

    #[tokio::test]
    async fn swagger_can_be_disabled() {
        let app = app_with(Config {
            enable_swagger: false,
            rate_limit_per_minute: 0,
            ..Config::default()
        })
        .await;
        let response = send(&app, request(Method::GET, "/api-docs/openapi.json", None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
