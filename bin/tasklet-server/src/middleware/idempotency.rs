use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tasklet_core::idempotency::IDEMPOTENCY_KEY_HEADER;

use crate::error::ServerError;
use crate::state::AppState;

/// Run every request through the idempotency guard before it reaches a handler.
///
/// Write requests without a usable `Idempotency-Key` get 400, repeats of an
/// admitted key on the same route get 409. Everything else passes through.
pub async fn idempotency_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Opaque bytes: non-ASCII keys are decoded as UTF-8, lossily.
    let key = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    match state
        .guard
        .admit(req.method().as_str(), req.uri().path(), key.as_deref())
    {
        Ok(_) => next.run(req).await,
        Err(rejection) => ServerError::from(rejection).into_response(),
    }
}
