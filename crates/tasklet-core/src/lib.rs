//! Core of the tasklet service.
//!
//! - [`domain`]: task records, statuses, patches and paging.
//! - [`entities`]: the SQLite record store and its unit-of-work sessions.
//! - [`services`]: task use cases on top of the store.
//! - [`idempotency`]: key registry and write-request guard.

pub mod domain;
pub mod entities;
pub mod idempotency;
pub mod services;
