//! Realtime fan-out: authenticated rooms and send primitives.

pub mod auth;
pub mod rooms;

pub use auth::{AUTH_SKEW_SECONDS, AuthError, verify_player_auth, verify_request_auth};
pub use rooms::{Registration, Rooms, TAKEOVER_CLOSE_CODE};
