//! WebSocket endpoint: player and spectator rooms.
//!
//! A connection's first frame decides its role: `auth` joins the player
//! room for `(game, address)` after signature verification, `spectate`
//! joins the open spectator room. After the initial snapshot the socket
//! task just drains its room queue in order, so clients observe
//! broadcasts exactly as the coordinator emitted them.

use std::borrow::Cow;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, info, warn};

use super::routes::AppState;
use crate::realtime::{Registration, TAKEOVER_CLOSE_CODE, verify_player_auth};
use crate::types::messages::{ClientMessage, ServerMessage};
use crate::types::primitives::{GameId, WalletAddress};

/// How long a fresh connection has to send its first frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgrade handler for `GET /ws`.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, socket.recv()).await;
    let Ok(Some(Ok(Message::Text(text)))) = first else {
        debug!("Socket closed before a valid first frame");
        return;
    };

    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Auth {
            game_id,
            address,
            signature,
            message,
        }) => {
            handle_player(socket, state, game_id, address, &signature, &message).await;
        }
        Ok(ClientMessage::Spectate { game_id }) => {
            handle_spectator(socket, state, game_id).await;
        }
        Err(e) => {
            send_error(&mut socket, &format!("unrecognized message: {e}")).await;
        }
    }
}

async fn handle_player(
    mut socket: WebSocket,
    state: AppState,
    game_id: GameId,
    address: WalletAddress,
    signature: &str,
    message: &str,
) {
    if let Err(e) = verify_player_auth(game_id, address, signature, message, state.clock.now()) {
        info!(%game_id, %address, error = %e, "WebSocket auth rejected");
        send_error(&mut socket, "authentication failed").await;
        return;
    }

    // The snapshot doubles as the registration check.
    let snapshot = match state.coordinator.auth_snapshot(game_id, address).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            info!(%game_id, %address, error = %e, "WebSocket auth rejected (not a player)");
            send_error(&mut socket, "not registered in this game").await;
            return;
        }
    };

    let registration = state.rooms.attach_player(game_id, address);
    let conn_id = registration.id;
    info!(%game_id, %address, "Player connected");

    if send(&mut socket, &snapshot).await.is_ok() {
        pump(socket, registration).await;
    }
    state.rooms.detach_player(game_id, address, conn_id);
    debug!(%game_id, %address, "Player disconnected");
}

async fn handle_spectator(mut socket: WebSocket, state: AppState, game_id: GameId) {
    let snapshot = match state.coordinator.spectate_snapshot(game_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            info!(%game_id, error = %e, "Spectate rejected");
            send_error(&mut socket, "game not found").await;
            return;
        }
    };

    let registration = state.rooms.attach_spectator(game_id);
    let conn_id = registration.id;
    debug!(%game_id, "Spectator connected");

    if send(&mut socket, &snapshot).await.is_ok() {
        pump(socket, registration).await;
    }
    state.rooms.detach_spectator(game_id, conn_id);
}

/// Drain the room queue into the socket until either side goes away or a
/// newer session takes the slot over.
async fn pump(mut socket: WebSocket, mut registration: Registration) {
    loop {
        tokio::select! {
            outbound = registration.rx.recv() => {
                match outbound {
                    Some(message) => {
                        if send(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    // Room dropped (game over): close normally.
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            () = registration.takeover.cancelled() => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: TAKEOVER_CLOSE_CODE,
                        reason: Cow::Borrowed("superseded by a newer session"),
                    })))
                    .await;
                break;
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only speak during the handshake; pings are
                    // answered by axum itself.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound message");
            Ok(())
        }
    }
}

async fn send_error(socket: &mut WebSocket, text: &str) {
    let _ = send(
        socket,
        &ServerMessage::Error {
            message: text.to_owned(),
        },
    )
    .await;
    let _ = socket.send(Message::Close(None)).await;
}
