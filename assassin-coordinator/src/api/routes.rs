//! REST surface.
//!
//! All game mutations arrive as signed requests: the client signs
//! `"chain-assassin:{timestamp}"` and sends `X-Address` / `X-Signature` /
//! `X-Message` headers. Verification recovers the signer and binds the
//! request to a wallet; handlers then delegate to the coordinator.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::game::{CheckinRequest, Coordinator, GameStatus};
use crate::ports::clock::Clock;
use crate::realtime::{Rooms, verify_request_auth};
use crate::types::primitives::{GameId, WalletAddress};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    /// The coordinator core.
    pub coordinator: Arc<Coordinator>,
    /// WebSocket rooms (used by the ws endpoint).
    pub rooms: Arc<Rooms>,
    /// Clock for auth timestamp checks.
    pub clock: Arc<dyn Clock>,
    /// Operator wallet allowed to call admin endpoints.
    pub operator_address: Option<WalletAddress>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Build the full API router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(super::ws::upgrade))
        .route("/api/games/:id/checkin", post(checkin))
        .route("/api/games/:id/location", post(location))
        .route("/api/games/:id/kill", post(kill))
        .route("/api/games/:id/heartbeat", post(heartbeat))
        .route("/api/games/:id/status", get(status))
        .route("/api/admin/check-auto-start", post(check_auto_start))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Extract and verify the signed-request headers, returning the caller.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<WalletAddress, ApiError> {
    let header = |name: &str| -> Result<String, ApiError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(ApiError::Unauthorized)
    };

    let address = WalletAddress::from_hex(&header("x-address")?)
        .map_err(|_| ApiError::Unauthorized)?;
    let signature = header("x-signature")?;
    let message = header("x-message")?;

    verify_request_auth(address, &signature, &message, state.clock.now())
        .map_err(|_| ApiError::Unauthorized)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckinBody {
    lat: f64,
    lng: f64,
    qr_payload: Option<String>,
    bluetooth_id: Option<String>,
    #[serde(default)]
    ble_nearby_addresses: Vec<String>,
}

async fn checkin(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<CheckinBody>,
) -> Result<Json<Value>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    state
        .coordinator
        .client_checkin(
            GameId::new(id),
            caller,
            CheckinRequest {
                lat: body.lat,
                lng: body.lng,
                qr_payload: body.qr_payload,
                bluetooth_token: body.bluetooth_id,
                ble_nearby: body.ble_nearby_addresses,
            },
        )
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationBody {
    lat: f64,
    lng: f64,
    timestamp: i64,
}

async fn location(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<LocationBody>,
) -> Result<Json<Value>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    state
        .coordinator
        .record_location(GameId::new(id), caller, body.lat, body.lng, body.timestamp)
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillBody {
    qr_payload: String,
    hunter_lat: f64,
    hunter_lng: f64,
    #[serde(default)]
    ble_nearby_addresses: Vec<String>,
}

async fn kill(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<KillBody>,
) -> Result<Json<Value>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    state
        .coordinator
        .submit_kill(
            GameId::new(id),
            caller,
            &body.qr_payload,
            body.hunter_lat,
            body.hunter_lng,
            body.ble_nearby_addresses,
        )
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatBody {
    qr_payload: String,
    lat: f64,
    lng: f64,
    #[serde(default)]
    ble_nearby_addresses: Vec<String>,
}

async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<HeartbeatBody>,
) -> Result<Json<Value>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let scanned = state
        .coordinator
        .submit_heartbeat(
            GameId::new(id),
            caller,
            &body.qr_payload,
            body.lat,
            body.lng,
            body.ble_nearby_addresses,
        )
        .await?;
    Ok(Json(
        json!({ "success": true, "scannedPlayerNumber": scanned.get() }),
    ))
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<GameStatus>, ApiError> {
    let snapshot = state.coordinator.game_status(GameId::new(id)).await?;
    Ok(Json(snapshot))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADMIN
// ═══════════════════════════════════════════════════════════════════════════════

async fn check_auto_start(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    if state.operator_address != Some(caller) {
        return Err(ApiError::Unauthorized);
    }
    info!(%caller, "Admin auto-start sweep requested");
    state.coordinator.check_auto_start().await?;
    Ok(Json(json!({ "success": true })))
}
