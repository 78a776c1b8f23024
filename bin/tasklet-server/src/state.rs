//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use tasklet_core::entities::SqliteStore;
use tasklet_core::idempotency::{IdempotencyGuard, IdempotencyStore};
use tasklet_core::services::TaskService;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;

#[derive(Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Database handle, kept for health checks and shutdown.
    pub store: SqliteStore,
    pub tasks: TaskService<SqliteStore>,
    pub guard: IdempotencyGuard,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire the core components around an opened store.
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let guard = IdempotencyGuard::new(IdempotencyStore::new(), config.idempotency_ttl);
        let rate_limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
        Self {
            tasks: TaskService::new(store.clone()),
            store,
            guard,
            rate_limiter,
            config: Arc::new(config),
        }
    }
}
