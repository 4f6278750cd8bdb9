//! WebSocket wire protocol message definitions.
//!
//! Frames are JSON objects with a `type` discriminator. The enum variants
//! below are the sealed set of shapes the coordinator ever sends; clients
//! send only `auth` and `spectate`. All timestamps on the wire are unix
//! seconds.

use serde::{Deserialize, Serialize};

use super::primitives::{GameId, PlayerNumber, WalletAddress};
use crate::types::enums::{GamePhase, SubPhase};

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Target reference sent to hunters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// The target's player number.
    pub player_number: PlayerNumber,
}

/// Current zone disk plus the next scheduled shrink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    /// Zone center latitude, degrees.
    pub center_lat: f64,
    /// Zone center longitude, degrees.
    pub center_lng: f64,
    /// Radius currently in force, meters.
    pub current_radius_meters: u32,
    /// When the next shrink takes effect (unix seconds), if any.
    pub next_shrink_at: Option<i64>,
    /// The radius the next shrink will impose, if any.
    pub next_radius_meters: Option<u32>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// The player's number.
    pub player_number: PlayerNumber,
    /// The player's wallet address.
    pub address: WalletAddress,
    /// Alive flag.
    pub is_alive: bool,
    /// Confirmed kills.
    pub kills: u32,
    /// Elimination time (unix seconds), if eliminated.
    pub eliminated_at: Option<i64>,
}

/// One player's position in a spectator frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorPlayer {
    /// The player's number.
    pub player_number: PlayerNumber,
    /// Latest reported latitude, degrees.
    pub lat: f64,
    /// Latest reported longitude, degrees.
    pub lng: f64,
    /// Alive flag.
    pub is_alive: bool,
    /// Confirmed kills.
    pub kills: u32,
}

/// One hunter→target edge shown to spectators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuntLink {
    /// Hunter's player number.
    pub hunter: PlayerNumber,
    /// Target's player number.
    pub target: PlayerNumber,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT → SERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Messages clients send over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Authenticate into a player room.
    #[serde(rename = "auth", rename_all = "camelCase")]
    Auth {
        /// The game to join.
        game_id: GameId,
        /// The claimed wallet address.
        address: WalletAddress,
        /// Hex signature over `message`.
        signature: String,
        /// The signed message, `"chain-assassin:{gameId}:{timestamp}"`.
        message: String,
    },
    /// Subscribe to a game's spectator room (no auth).
    #[serde(rename = "spectate", rename_all = "camelCase")]
    Spectate {
        /// The game to watch.
        game_id: GameId,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER → CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Messages the coordinator pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Player room authentication succeeded.
    #[serde(rename = "auth:success", rename_all = "camelCase")]
    AuthSuccess {
        /// Authenticated wallet address.
        address: WalletAddress,
        /// The player's number.
        player_number: PlayerNumber,
        /// Current sub-phase, if the game is active.
        sub_phase: Option<SubPhase>,
        /// The player's current target (sub-phase `game` only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetInfo>,
        /// The player's current hunter (sub-phase `game` only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hunter_player_number: Option<PlayerNumber>,
        /// Current zone state (sub-phase `game` only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone: Option<ZoneState>,
        /// The player's heartbeat deadline (unix seconds).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heartbeat_deadline: Option<i64>,
    },

    /// Spectator room snapshot on connect.
    #[serde(rename = "spectate:init", rename_all = "camelCase")]
    SpectateInit {
        /// The watched game.
        game_id: GameId,
        /// Lifecycle phase.
        phase: GamePhase,
        /// Sub-phase, if active.
        sub_phase: Option<SubPhase>,
        /// Registered players.
        player_count: u32,
        /// Alive players.
        alive_count: u32,
        /// Current leaderboard.
        leaderboard: Vec<LeaderboardEntry>,
        /// Latest positions snapshot.
        players: Vec<SpectatorPlayer>,
        /// Current zone state, if the hunt is running.
        zone: Option<ZoneState>,
    },

    /// A player registered on chain.
    #[serde(rename = "player:registered", rename_all = "camelCase")]
    PlayerRegistered {
        /// The new player's number.
        player_number: PlayerNumber,
        /// Updated player count.
        player_count: u32,
    },

    /// A player checked in (client-driven or auto-seeded).
    #[serde(rename = "checkin:update", rename_all = "camelCase")]
    CheckinUpdate {
        /// Players checked in so far.
        checked_in_count: u32,
        /// Total registered players.
        total_players: u32,
        /// The player who just checked in.
        player_number: PlayerNumber,
    },

    /// Check-in opened.
    #[serde(rename = "game:checkin_started", rename_all = "camelCase")]
    GameCheckinStarted {
        /// Advisory check-in window length for countdown display.
        checkin_duration_seconds: u64,
        /// Advisory window end (unix seconds).
        checkin_ends_at: i64,
        /// Check-ins required before the hunt starts.
        required_checked_in: u32,
    },

    /// Check-in completed; pregame countdown running.
    #[serde(rename = "game:pregame_started", rename_all = "camelCase")]
    GamePregameStarted {
        /// Countdown length.
        pregame_duration_seconds: u64,
        /// Countdown end (unix seconds).
        pregame_ends_at: i64,
        /// Players who made it through check-in.
        checked_in_count: u32,
        /// Total registered players.
        player_count: u32,
    },

    /// Per-player hunt start payload.
    #[serde(rename = "game:started", rename_all = "camelCase")]
    GameStarted {
        /// The recipient's assigned target.
        target: TargetInfo,
        /// The recipient's hunter.
        hunter_player_number: PlayerNumber,
        /// First heartbeat deadline (unix seconds).
        heartbeat_deadline: i64,
        /// Heartbeat refresh window length.
        heartbeat_interval_seconds: u64,
        /// Initial zone state.
        zone: ZoneState,
    },

    /// Broadcast hunt start.
    #[serde(rename = "game:started_broadcast", rename_all = "camelCase")]
    GameStartedBroadcast {
        /// Players in the hunt.
        player_count: u32,
    },

    /// The recipient was rewired to a new target.
    #[serde(rename = "target:assigned", rename_all = "camelCase")]
    TargetAssigned {
        /// The new target.
        target: TargetInfo,
        /// The recipient's (possibly unchanged) hunter.
        hunter_player_number: PlayerNumber,
    },

    /// The recipient's hunter changed.
    #[serde(rename = "hunter:updated", rename_all = "camelCase")]
    HunterUpdated {
        /// The new hunter's number.
        hunter_player_number: PlayerNumber,
    },

    /// A kill was verified and recorded.
    #[serde(rename = "kill:recorded", rename_all = "camelCase")]
    KillRecorded {
        /// The hunter's number.
        hunter_number: PlayerNumber,
        /// The eliminated target's number.
        target_number: PlayerNumber,
        /// The hunter's updated kill count.
        hunter_kills: u32,
    },

    /// A player left the game (any cause).
    #[serde(rename = "player:eliminated", rename_all = "camelCase")]
    PlayerEliminated {
        /// The eliminated player's number.
        player_number: PlayerNumber,
        /// The eliminating hunter's number, for kills.
        eliminator_number: Option<PlayerNumber>,
        /// `"kill"` or an elimination sentinel.
        reason: String,
    },

    /// A zone shrink took effect.
    #[serde(rename = "zone:shrink", rename_all = "camelCase")]
    ZoneShrink {
        /// Zone center latitude, degrees.
        center_lat: f64,
        /// Zone center longitude, degrees.
        center_lng: f64,
        /// Radius now in force, meters.
        current_radius_meters: u32,
        /// When the next shrink takes effect (unix seconds), if any.
        next_shrink_at: Option<i64>,
        /// The next radius, if any.
        next_radius_meters: Option<u32>,
    },

    /// Out-of-zone warning with the remaining grace.
    #[serde(rename = "zone:warning", rename_all = "camelCase")]
    ZoneWarning {
        /// Seconds until elimination.
        seconds_remaining: u64,
        /// Always `false` in this message.
        in_zone: bool,
    },

    /// The recipient's liveness was refreshed by a scan.
    #[serde(rename = "heartbeat:refreshed", rename_all = "camelCase")]
    HeartbeatRefreshed {
        /// New heartbeat deadline (unix seconds).
        refreshed_until: i64,
    },

    /// The recipient's scan refreshed another player.
    #[serde(rename = "heartbeat:scan_success", rename_all = "camelCase")]
    HeartbeatScanSuccess {
        /// The refreshed player's number.
        scanned_player_number: PlayerNumber,
    },

    /// Leaderboard changed.
    #[serde(rename = "leaderboard:update", rename_all = "camelCase")]
    LeaderboardUpdate {
        /// Full ordered leaderboard.
        entries: Vec<LeaderboardEntry>,
    },

    /// Final result (player numbers; 0 = unfunded slot).
    #[serde(rename = "game:ended", rename_all = "camelCase")]
    GameEnded {
        /// First place.
        winner1: u16,
        /// Second place.
        winner2: u16,
        /// Third place.
        winner3: u16,
        /// Top killer.
        top_killer: u16,
    },

    /// The game was cancelled or expired.
    #[serde(rename = "game:cancelled", rename_all = "camelCase")]
    GameCancelled {
        /// The cancelled game.
        game_id: GameId,
    },

    /// Periodic spectator frame.
    #[serde(rename = "spectator:positions", rename_all = "camelCase")]
    SpectatorPositions {
        /// Latest alive-player positions.
        players: Vec<SpectatorPlayer>,
        /// Current zone state.
        zone: Option<ZoneState>,
        /// Alive players.
        alive_count: u32,
        /// Current hunter→target edges.
        hunt_links: Vec<HuntLink>,
    },

    /// Terminal error on this connection.
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        /// Short human-readable description.
        message: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_message_tags_match_protocol() {
        let msg = ServerMessage::GameStartedBroadcast { player_count: 6 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "game:started_broadcast");
        assert_eq!(json["playerCount"], 6);
    }

    #[test]
    fn auth_success_omits_absent_game_fields() {
        let msg = ServerMessage::AuthSuccess {
            address: WalletAddress::ZERO,
            player_number: PlayerNumber::new(3).unwrap(),
            sub_phase: Some(SubPhase::Checkin),
            target: None,
            hunter_player_number: None,
            zone: None,
            heartbeat_deadline: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "auth:success");
        assert_eq!(json["subPhase"], "checkin");
        assert!(json.get("target").is_none());
        assert!(json.get("heartbeatDeadline").is_none());
    }

    #[test]
    fn client_auth_parses() {
        let json = r#"{
            "type": "auth",
            "gameId": 1,
            "address": "0x1111111111111111111111111111111111111111",
            "signature": "0xdead",
            "message": "chain-assassin:1:1700000000"
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { game_id, .. } if game_id.get() == 1));
    }

    #[test]
    fn eliminated_reason_strings() {
        let msg = ServerMessage::PlayerEliminated {
            player_number: PlayerNumber::new(2).unwrap(),
            eliminator_number: None,
            reason: "zone_violation".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["reason"], "zone_violation");
        assert_eq!(json["eliminatorNumber"], serde_json::Value::Null);
    }

    #[test]
    fn zone_shrink_shape() {
        let msg = ServerMessage::ZoneShrink {
            center_lat: 52.52,
            center_lng: 13.405,
            current_radius_meters: 1000,
            next_shrink_at: Some(1_700_000_600),
            next_radius_meters: Some(300),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "zone:shrink");
        assert_eq!(json["currentRadiusMeters"], 1000);
        assert_eq!(json["nextRadiusMeters"], 300);
    }
}
