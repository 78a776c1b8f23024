use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// In-memory registry of idempotency keys with per-entry expiry.
///
/// One map from composed key to expiry instant. An entry whose expiry has
/// passed is treated as absent by every operation, whether or not
/// [`IdempotencyStore::purge_expired`] has removed it yet. Clones share the
/// same map.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyStore {
    entries: Arc<Mutex<HashMap<String, Instant>>>,
}

/// Stand-in lifetime for a TTL too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `lowercase("{route}::{key}")`, so casing differences in either part collide.
pub fn compose_key(key: &str, route: &str) -> String {
    format!("{route}::{key}").to_lowercase()
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired entry exists for `(key, route)`.
    pub fn exists(&self, key: &str, route: &str) -> bool {
        let composed = compose_key(key, route);
        let now = Instant::now();
        self.lock()
            .get(&composed)
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Insert or refresh the entry for `(key, route)`, expiring `ttl` from now.
    pub fn register(&self, key: &str, route: &str, ttl: Duration) {
        let composed = compose_key(key, route);
        let expires_at = expiry(Instant::now(), ttl);
        self.lock().insert(composed, expires_at);
    }

    /// Register `(key, route)` only if no unexpired entry exists.
    ///
    /// The check and the insert happen under one lock, so of any number of
    /// concurrent callers with the same composed key exactly one gets `true`.
    pub fn try_register(&self, key: &str, route: &str, ttl: Duration) -> bool {
        let composed = compose_key(key, route);
        let now = Instant::now();
        let mut entries = self.lock();
        if entries.get(&composed).is_some_and(|expires_at| *expires_at > now) {
            return false;
        }
        entries.insert(composed, expiry(now, ttl));
        true
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    /// Entries currently held, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `now + ttl`, saturating to a far-future instant instead of overflowing.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
