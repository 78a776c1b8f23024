//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;
use tracing::warn;

use crate::error::ServerError;
use crate::state::AppState;

/// Client key used when the peer address is unknown.
pub const GLOBAL_CLIENT: &str = "global";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per client key. A `limit` of 0 admits everything.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Count one request for `client`. `Err` carries the time until the
    /// client's window resets.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        if !self.is_enabled() {
            return Ok(());
        }
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            return Err(self.window.saturating_sub(now.duration_since(entry.started)));
        }
        entry.count += 1;
        Ok(())
    }

    /// Forget clients whose window has closed.
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < self.window);
        before - windows.len()
    }
}

/// Reject the request with 429 once its client exceeds the window budget.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| GLOBAL_CLIENT.to_owned());

    match state.rate_limiter.check(&client) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            warn!(%client, "rate limit exceeded");
            // Round up so clients never retry a moment too early.
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            ServerError::TooManyRequests { retry_after_secs }.into_response()
        }
    }
}
