//! Persistent domain entities.
//!
//! These structs are the store's currency: plain owned data, no behavior
//! beyond small derived accessors. Timestamps are UTC; coordinates are
//! carried in the contract's fixed-point micro-degree representation and
//! converted at the geo seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_client::PrizeSplit;
use uuid::Uuid;

use super::enums::{GamePhase, OperatorAction, SubPhase, TxStatus};
use super::primitives::{GameId, PlayerNumber, WalletAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// GAME
// ═══════════════════════════════════════════════════════════════════════════════

/// A game and its full lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Contract-originated id.
    pub id: GameId,
    /// Display title.
    pub title: String,
    /// Entry fee in wei (decimal string; no arithmetic is done off-chain).
    pub entry_fee: String,
    /// Minimum players for the game to run.
    pub min_players: u32,
    /// Registration cap.
    pub max_players: u32,
    /// Registration closes at this chain time.
    pub registration_deadline: DateTime<Utc>,
    /// Scheduled start.
    pub game_date: DateTime<Utc>,
    /// Hard deadline for completing check-in.
    pub expiry_deadline: DateTime<Utc>,
    /// Maximum hunt duration in seconds.
    pub max_duration_seconds: u64,
    /// Zone center latitude, micro-degrees.
    pub zone_center_lat: i32,
    /// Zone center longitude, micro-degrees.
    pub zone_center_lng: i32,
    /// Meeting point latitude, micro-degrees (unset falls back to center).
    pub meeting_lat: Option<i32>,
    /// Meeting point longitude, micro-degrees.
    pub meeting_lng: Option<i32>,
    /// Prize split in basis points.
    pub prize_split: PrizeSplit,
    /// Registered player count.
    pub player_count: u32,
    /// Escrow total in wei (decimal string).
    pub total_collected: String,
    /// Lifecycle phase.
    pub phase: GamePhase,
    /// Sub-phase, set only while `phase == Active`.
    pub sub_phase: Option<SubPhase>,
    /// When the game entered `Active`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the current sub-phase began.
    pub sub_phase_started_at: Option<DateTime<Utc>>,
    /// When the game reached a terminal phase.
    pub ended_at: Option<DateTime<Utc>>,
    /// Resolved first place.
    pub winner1: Option<WalletAddress>,
    /// Resolved second place (slot may be unfunded).
    pub winner2: Option<WalletAddress>,
    /// Resolved third place (slot may be unfunded).
    pub winner3: Option<WalletAddress>,
    /// Resolved top killer (slot may be unfunded).
    pub top_killer: Option<WalletAddress>,
}

impl Game {
    /// Check-ins required before the hunt can start.
    ///
    /// One for the eventual winner, plus one per funded podium slot.
    #[must_use]
    pub const fn required_checked_in(&self) -> u32 {
        1 + (self.prize_split.bps_2nd > 0) as u32 + (self.prize_split.bps_3rd > 0) as u32
    }

    /// Meeting point in micro-degrees, falling back to the zone center.
    #[must_use]
    pub fn meeting_point(&self) -> (i32, i32) {
        match (self.meeting_lat, self.meeting_lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => (self.zone_center_lat, self.zone_center_lng),
        }
    }
}

/// One step of a game's zone shrink schedule.
///
/// `shrinks[0]` (at second 0) defines the initial radius. `at_second` is
/// non-decreasing across the schedule; radii strictly decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneShrink {
    /// Owning game.
    pub game_id: GameId,
    /// Seconds after the hunt begins at which this radius applies.
    pub at_second: u32,
    /// Zone radius in meters from this step on.
    pub radius_meters: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER
// ═══════════════════════════════════════════════════════════════════════════════

/// A registered player within one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Owning game.
    pub game_id: GameId,
    /// Wallet address (unique within the game).
    pub address: WalletAddress,
    /// 1-based registration index, never reused.
    pub number: PlayerNumber,
    /// Alive flag; false implies `eliminated_at` is set.
    pub is_alive: bool,
    /// Confirmed kill count.
    pub kills: u32,
    /// When the player was eliminated.
    pub eliminated_at: Option<DateTime<Utc>>,
    /// Hunter address (0x-hex) or a sentinel reason string.
    pub eliminated_by: Option<String>,
    /// Whether the player completed check-in (monotonic within a game).
    pub checked_in: bool,
    /// Canonicalized Bluetooth token, once presented.
    pub bluetooth_token: Option<String>,
    /// Last heartbeat refresh.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Whether the prize/refund was claimed on chain.
    pub has_claimed: bool,
    /// Registration time (from the chain event's block).
    pub registered_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TARGET ASSIGNMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// One hunter→target edge of the target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetAssignment {
    /// Owning game.
    pub game_id: GameId,
    /// The hunting player.
    pub hunter: WalletAddress,
    /// Their current target.
    pub target: WalletAddress,
    /// When this edge was created or last rewired.
    pub assigned_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// KILL RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable audit row for a verified kill.
#[derive(Debug, Clone, PartialEq)]
pub struct KillRecord {
    /// Row id.
    pub id: Uuid,
    /// Owning game.
    pub game_id: GameId,
    /// The hunter.
    pub hunter: WalletAddress,
    /// The eliminated target.
    pub target: WalletAddress,
    /// When the kill was verified.
    pub occurred_at: DateTime<Utc>,
    /// Hunter's reported latitude (degrees).
    pub hunter_lat: f64,
    /// Hunter's reported longitude (degrees).
    pub hunter_lng: f64,
    /// Target's last known latitude (degrees).
    pub target_lat: f64,
    /// Target's last known longitude (degrees).
    pub target_lng: f64,
    /// Measured hunter→target distance in meters.
    pub distance_meters: f64,
    /// Settlement transaction hash, written once confirmed.
    pub tx_hash: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION PING
// ═══════════════════════════════════════════════════════════════════════════════

/// A player's location report.
///
/// The store keeps the latest ping per `(game, address)` plus a short
/// recent history for recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPing {
    /// Owning game.
    pub game_id: GameId,
    /// Reporting player.
    pub address: WalletAddress,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// When the ping was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Whether the point was inside the zone at the time.
    pub in_zone: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEARTBEAT SCAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable record of a successful mutual-scan event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatScan {
    /// Row id.
    pub id: Uuid,
    /// Owning game.
    pub game_id: GameId,
    /// The player who scanned.
    pub scanner: WalletAddress,
    /// The player whose liveness was refreshed.
    pub scanned: WalletAddress,
    /// When the scan was verified.
    pub occurred_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATOR TX (outbox)
// ═══════════════════════════════════════════════════════════════════════════════

/// Outbox row for a settlement transaction the coordinator submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorTx {
    /// Row id.
    pub id: Uuid,
    /// Owning game.
    pub game_id: GameId,
    /// Which operator call this row tracks.
    pub action: OperatorAction,
    /// Submission status.
    pub status: TxStatus,
    /// Transaction hash, once confirmed.
    pub tx_hash: Option<String>,
    /// Failure detail, if `status == Failed`.
    pub error: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn game_with_split(bps_2nd: u16, bps_3rd: u16) -> Game {
        Game {
            id: GameId::new(1),
            title: "t".into(),
            entry_fee: "0".into(),
            min_players: 2,
            max_players: 10,
            registration_deadline: Utc::now(),
            game_date: Utc::now(),
            expiry_deadline: Utc::now(),
            max_duration_seconds: 3600,
            zone_center_lat: 1_000_000,
            zone_center_lng: 2_000_000,
            meeting_lat: None,
            meeting_lng: None,
            prize_split: PrizeSplit {
                bps_1st: 5000,
                bps_2nd,
                bps_3rd,
                bps_kills: 0,
                bps_creator: 0,
            },
            player_count: 0,
            total_collected: "0".into(),
            phase: GamePhase::Registration,
            sub_phase: None,
            started_at: None,
            sub_phase_started_at: None,
            ended_at: None,
            winner1: None,
            winner2: None,
            winner3: None,
            top_killer: None,
        }
    }

    #[test]
    fn required_checked_in_counts_funded_slots() {
        assert_eq!(game_with_split(0, 0).required_checked_in(), 1);
        assert_eq!(game_with_split(1500, 0).required_checked_in(), 2);
        assert_eq!(game_with_split(1500, 1000).required_checked_in(), 3);
        // A funded third without a funded second still only adds one.
        assert_eq!(game_with_split(0, 1000).required_checked_in(), 2);
    }

    #[test]
    fn meeting_point_falls_back_to_center() {
        let mut game = game_with_split(0, 0);
        assert_eq!(game.meeting_point(), (1_000_000, 2_000_000));
        game.meeting_lat = Some(3_000_000);
        game.meeting_lng = Some(4_000_000);
        assert_eq!(game.meeting_point(), (3_000_000, 4_000_000));
    }
}
