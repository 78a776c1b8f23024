//! Duplicate-request suppression for write endpoints.
//!
//! [`IdempotencyStore`] remembers `(route, key)` pairs until they expire and
//! [`IdempotencyGuard`] turns that into an admit/reject decision per request.

pub mod guard;
pub mod store;

pub use guard::{
    Admission, DEFAULT_KEY_TTL, GuardRejection, IDEMPOTENCY_KEY_HEADER, IdempotencyGuard,
    is_write_method,
};
pub use store::{IdempotencyStore, compose_key};

use std::time::Duration;

/// Periodically purge expired keys until the returned handle is aborted.
pub fn spawn_sweeper(store: IdempotencyStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "purged expired idempotency keys");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_keys() {
        let store = IdempotencyStore::new();
        store.register("k", "POST:/x", Duration::from_secs(5));
        let handle = spawn_sweeper(store.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(store.is_empty());
        handle.abort();
    }
}
