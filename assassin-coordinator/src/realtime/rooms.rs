//! WebSocket room registry and send primitives.
//!
//! Two kinds of rooms per game: the authenticated player room (exactly
//! one live connection per `(game, address)`) and the open spectator
//! room. Connections are mpsc senders; the socket task on the other end
//! drains its queue in order, which is what gives per-connection ordering
//! of broadcasts relative to state changes.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::messages::ServerMessage;
use crate::types::primitives::{GameId, WalletAddress};

/// Close code sent when a newer session takes over a player slot.
pub const TAKEOVER_CLOSE_CODE: u16 = 4000;

#[derive(Debug)]
struct PlayerConn {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerMessage>,
    takeover: CancellationToken,
}

/// A registered connection handed to the socket task.
#[derive(Debug)]
pub struct Registration {
    /// Connection id (used to detach only your own registration).
    pub id: Uuid,
    /// Queue of outbound messages to drain into the socket.
    pub rx: mpsc::UnboundedReceiver<ServerMessage>,
    /// Cancelled when a newer session supersedes this one.
    pub takeover: CancellationToken,
}

/// Room registry and fan-out.
#[derive(Debug, Default)]
pub struct Rooms {
    players: DashMap<GameId, HashMap<WalletAddress, PlayerConn>>,
    spectators: DashMap<GameId, HashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>>,
}

impl Rooms {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the player room for `(game, address)`.
    ///
    /// A previous connection for the same player is superseded: its
    /// takeover token fires and its queue closes.
    #[must_use]
    pub fn attach_player(&self, game_id: GameId, address: WalletAddress) -> Registration {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = PlayerConn {
            id: Uuid::new_v4(),
            tx,
            takeover: CancellationToken::new(),
        };
        let registration = Registration {
            id: conn.id,
            rx,
            takeover: conn.takeover.clone(),
        };

        let previous = self
            .players
            .entry(game_id)
            .or_default()
            .insert(address, conn);
        if let Some(old) = previous {
            old.takeover.cancel();
        }

        registration
    }

    /// Leave the player room, only if `conn_id` still owns the slot.
    pub fn detach_player(&self, game_id: GameId, address: WalletAddress, conn_id: Uuid) {
        if let Some(mut room) = self.players.get_mut(&game_id) {
            if room.get(&address).is_some_and(|c| c.id == conn_id) {
                room.remove(&address);
            }
        }
    }

    /// Join the spectator room for a game.
    #[must_use]
    pub fn attach_spectator(&self, game_id: GameId) -> Registration {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.spectators.entry(game_id).or_default().insert(id, tx);
        Registration {
            id,
            rx,
            takeover: CancellationToken::new(),
        }
    }

    /// Leave the spectator room.
    pub fn detach_spectator(&self, game_id: GameId, conn_id: Uuid) {
        if let Some(mut room) = self.spectators.get_mut(&game_id) {
            room.remove(&conn_id);
        }
    }

    /// Send to every player and spectator of a game.
    pub fn broadcast(&self, game_id: GameId, message: &ServerMessage) {
        if let Some(room) = self.players.get(&game_id) {
            for conn in room.values() {
                let _ = conn.tx.send(message.clone());
            }
        }
        self.broadcast_spectators(game_id, message);
    }

    /// Send to a single player, if connected.
    pub fn send_to_player(&self, game_id: GameId, address: WalletAddress, message: &ServerMessage) {
        if let Some(room) = self.players.get(&game_id) {
            if let Some(conn) = room.get(&address) {
                let _ = conn.tx.send(message.clone());
            }
        }
    }

    /// Send to every spectator of a game.
    pub fn broadcast_spectators(&self, game_id: GameId, message: &ServerMessage) {
        if let Some(room) = self.spectators.get(&game_id) {
            for tx in room.values() {
                let _ = tx.send(message.clone());
            }
        }
    }

    /// Drop every room of a game (terminal phase).
    pub fn close_game(&self, game_id: GameId) {
        self.players.remove(&game_id);
        self.spectators.remove(&game_id);
    }

    /// Connected player count for a game.
    #[must_use]
    pub fn player_connections(&self, game_id: GameId) -> usize {
        self.players.get(&game_id).map_or(0, |room| room.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
