//! HTTP API: REST routes and the WebSocket endpoint.

pub mod routes;
pub mod ws;

pub use routes::{AppState, router};
