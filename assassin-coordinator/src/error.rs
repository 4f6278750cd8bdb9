//! Layered error types for the coordinator.
//!
//! This module provides a hierarchical error system:
//!
//! - [`VerifyError`] - Proof verification rejections (kill, heartbeat,
//!   check-in); returned to clients verbatim, never mutate state
//! - [`DomainError`] - Lifecycle/business errors
//! - [`InfraError`] - Infrastructure errors (database, chain, serialization)
//! - [`AppError`] - Application-level errors combining domain and infra
//! - [`ApiError`] - HTTP API errors with status codes
//!
//! # Error Philosophy
//!
//! - Verification errors are expected traffic: one info-level log line,
//!   a `{success:false, error}` response, nothing else
//! - Lifecycle errors from chain submissions are logged at error level and
//!   never roll game state back (the chain is the source of truth)
//! - Infrastructure error details are hidden from clients

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::types::primitives::GameId;

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Typed rejection from the kill / heartbeat / check-in verifiers.
///
/// The [`code`](Self::code) strings are the stable client-facing taxonomy;
/// clients surface them as short toasts.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// QR payload is malformed.
    #[error("invalid QR payload")]
    InvalidQr,
    /// QR payload belongs to a different game.
    #[error("QR payload is for another game")]
    WrongGame,
    /// QR resolves to a player number that does not exist.
    #[error("unknown player")]
    UnknownPlayer,
    /// Submitter is not registered in this game.
    #[error("not registered in this game")]
    NotRegistered,
    /// Submitting hunter is already eliminated.
    #[error("you are already eliminated")]
    HunterEliminated,
    /// Scanned target is already eliminated.
    #[error("target is already eliminated")]
    TargetAlreadyEliminated,
    /// Scanned player is not the hunter's assigned target.
    #[error("not your target")]
    NotYourTarget,
    /// The target has no persisted location.
    #[error("target location unavailable")]
    TargetLocationUnavailable,
    /// GPS distance exceeds the proximity threshold.
    #[error("too far from target ({distance_meters:.0} m)")]
    TooFar {
        /// Measured hunter→target distance.
        distance_meters: f64,
    },
    /// The target never presented a Bluetooth token.
    #[error("target has no Bluetooth token")]
    TargetBluetoothMissing,
    /// The target's token was not among the reported nearby tokens.
    #[error("target not seen over Bluetooth")]
    NotSeenOverBluetooth,
    /// A player scanned their own QR code.
    #[error("cannot scan yourself")]
    ScanYourself,
    /// Heartbeat scan of the scanner's own target.
    #[error("cannot heartbeat your target")]
    ScanYourTarget,
    /// Heartbeat scan of the scanner's own hunter.
    #[error("cannot heartbeat your hunter")]
    ScanYourHunter,
    /// Heartbeat enforcement is disabled at the current alive count.
    #[error("heartbeat is disabled")]
    HeartbeatDisabled,
    /// Check-in window is over (expiry passed or sub-phase moved on).
    #[error("check-in is closed")]
    CheckinClosed,
    /// Submitter is too far from the meeting point.
    #[error("too far from the meeting point")]
    TooFarFromMeetingPoint,
    /// Submitter already checked in (and has a token on file).
    #[error("already checked in")]
    AlreadyCheckedIn,
    /// The scanned QR belongs to a player who has not checked in.
    #[error("scanned player has not checked in")]
    ScannedNotCheckedIn,
}

impl VerifyError {
    /// Stable taxonomy code for logs and client toasts.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQr => "invalidQr",
            Self::WrongGame => "wrongGame",
            Self::UnknownPlayer => "unknownPlayer",
            Self::NotRegistered => "notRegistered",
            Self::HunterEliminated => "hunterEliminated",
            Self::TargetAlreadyEliminated => "targetAlreadyEliminated",
            Self::NotYourTarget => "notYourTarget",
            Self::TargetLocationUnavailable => "targetLocationUnavailable",
            Self::TooFar { .. } => "tooFar",
            Self::TargetBluetoothMissing => "targetBluetoothMissing",
            Self::NotSeenOverBluetooth => "notSeenOverBluetooth",
            Self::ScanYourself => "scanYourself",
            Self::ScanYourTarget => "scanYourTarget",
            Self::ScanYourHunter => "scanYourHunter",
            Self::HeartbeatDisabled => "heartbeatDisabled",
            Self::CheckinClosed => "checkinClosed",
            Self::TooFarFromMeetingPoint => "tooFarFromMeetingPoint",
            Self::AlreadyCheckedIn => "alreadyCheckedIn",
            Self::ScannedNotCheckedIn => "scannedNotCheckedIn",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors representing lifecycle violations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Proof verification rejected.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Unknown game id.
    #[error("game not found: {0}")]
    GameNotFound(GameId),

    /// Operation requires an active game.
    #[error("game not active: {0}")]
    GameNotActive(GameId),

    /// A cancellation submission was already in flight.
    #[error("duplicate cancellation suppressed for game {0}")]
    DuplicateCancellationSuppressed(GameId),

    /// An expiry submission was already in flight.
    #[error("duplicate expiry suppressed for game {0}")]
    DuplicateExpirySuppressed(GameId),

    /// A game-end was already in flight.
    #[error("duplicate end suppressed for game {0}")]
    DuplicateEndSuppressed(GameId),

    /// The target chain disagrees with the store (should never happen).
    #[error("target chain inconsistency in game {game_id}: {detail}")]
    ChainInconsistency {
        /// Affected game.
        game_id: GameId,
        /// What was inconsistent.
        detail: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
///
/// These errors are logged but their details are hidden from clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Operator transaction submission failed.
    #[error("chain submission failed: {0}")]
    ChainSubmissionFailed(#[source] settlement_client::SettlementError),

    /// Chain event processing failed (cursor will not advance).
    #[error("chain event processing failed: {0}")]
    ChainEventProcessingFailed(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed data read back from storage.
    #[error("corrupt store data: {0}")]
    CorruptData(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
///
/// This is the primary error type used throughout the coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        Self::Domain(DomainError::Verify(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// API-level errors with HTTP status codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Signed-request authentication failed.
    #[error("unauthorized")]
    Unauthorized,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::App(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Verification rejections are the normal failure path:
            // 200 with {success:false} so clients surface the toast.
            Self::App(AppError::Domain(DomainError::Verify(err))) => {
                return (
                    StatusCode::OK,
                    Json(json!({ "success": false, "error": err.code() })),
                )
                    .into_response();
            }

            Self::App(AppError::Domain(DomainError::GameNotFound(_))) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }

            Self::App(AppError::Domain(
                DomainError::GameNotActive(_)
                | DomainError::DuplicateCancellationSuppressed(_)
                | DomainError::DuplicateExpirySuppressed(_)
                | DomainError::DuplicateEndSuppressed(_),
            )) => (StatusCode::CONFLICT, self.to_string()),

            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),

            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),

            // Infrastructure and consistency errors: log, don't expose
            Self::App(
                AppError::Domain(DomainError::ChainInconsistency { .. })
                | AppError::Infra(_)
                | AppError::Initialization(_),
            ) => {
                tracing::error!(error = ?self, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        (
            status,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
