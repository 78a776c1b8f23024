use std::time::Duration;

use tracing::{debug, warn};

use super::store::IdempotencyStore;

/// Request header carrying the client-chosen idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Default lifetime of an admitted key.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(30 * 60);

/// Methods that must carry an idempotency key.
pub fn is_write_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH"
    )
}

/// Outcome for a request that may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not a write; no key required.
    Bypassed,
    /// First sighting of this key on this route; it is now registered.
    Admitted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejection {
    #[error("the Idempotency-Key header is required for this request")]
    MissingKey,
    #[error("a request with this Idempotency-Key has already been processed")]
    Duplicate,
}

/// Admission control for write requests based on [`IdempotencyStore`].
///
/// A key is registered the moment a request is admitted and stays registered
/// for `ttl`, even if the handler later fails.
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    store: IdempotencyStore,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: IdempotencyStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &IdempotencyStore {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Decide whether `method path` may proceed given its key header value.
    pub fn admit(
        &self,
        method: &str,
        path: &str,
        key: Option<&str>,
    ) -> Result<Admission, GuardRejection> {
        if !is_write_method(method) {
            return Ok(Admission::Bypassed);
        }
        // Blank means missing, but the key is composed exactly as sent.
        let key = key
            .filter(|k| !k.trim().is_empty())
            .ok_or(GuardRejection::MissingKey)?;

        let route = route_descriptor(method, path);
        if self.store.try_register(key, &route, self.ttl) {
            debug!(%route, "idempotency key admitted");
            Ok(Admission::Admitted)
        } else {
            warn!(%route, "duplicate idempotency key rejected");
            Err(GuardRejection::Duplicate)
        }
    }
}

fn route_descriptor(method: &str, path: &str) -> String {
    format!("{}:{path}", method.to_ascii_uppercase())
}
