//! Request and response shapes of the HTTP API.

pub mod api;
