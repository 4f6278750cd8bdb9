//! Port traits and plain-Rust views of settlement-contract state.
//!
//! The coordinator depends on these traits only; the alloy-backed
//! [`crate::client::SettlementClient`] and the in-memory simulated
//! settlement (feature `test-utils`) both implement them.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::abi::GameConfig;
use crate::error::{Result, SettlementError};
use crate::events::ChainEvent;

// ═══════════════════════════════════════════════════════════════════════════════
// ON-CHAIN STATE VIEWS
// ═══════════════════════════════════════════════════════════════════════════════

/// Contract-side game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OnchainPhase {
    /// Registration open, entry fees being escrowed.
    Registration = 0,
    /// Game started by the operator.
    Active = 1,
    /// Final result submitted, payouts unlocked.
    Ended = 2,
    /// Cancelled or expired, refunds unlocked.
    Cancelled = 3,
}

impl TryFrom<u8> for OnchainPhase {
    type Error = SettlementError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Registration),
            1 => Ok(Self::Active),
            2 => Ok(Self::Ended),
            3 => Ok(Self::Cancelled),
            other => Err(SettlementError::Decode(format!(
                "unknown contract phase: {other}"
            ))),
        }
    }
}

/// One step of a game's zone shrink schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneShrinkSpec {
    /// Seconds after the hunt begins at which this radius applies.
    pub at_second: u32,
    /// Zone radius in meters from this step on.
    pub radius_meters: u32,
}

/// A game's full configuration in coordinator-facing shape.
///
/// Coordinates stay in the contract's fixed-point representation
/// (degrees scaled by 10^6); the coordinator converts at the geo seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    /// Display title.
    pub title: String,
    /// Entry fee in wei.
    pub entry_fee: U256,
    /// Minimum players for the game to run.
    pub min_players: u32,
    /// Registration cap.
    pub max_players: u32,
    /// Registration closes at this time.
    pub registration_deadline: DateTime<Utc>,
    /// Scheduled start.
    pub game_date: DateTime<Utc>,
    /// Hard deadline for completing check-in.
    pub expiry_deadline: DateTime<Utc>,
    /// Maximum hunt duration in seconds.
    pub max_duration_seconds: u64,
    /// Zone center, fixed-point micro-degrees (lat, lng).
    pub zone_center: (i32, i32),
    /// Meeting point, fixed-point micro-degrees; `None` falls back to
    /// the zone center.
    pub meeting_point: Option<(i32, i32)>,
    /// Prize split in basis points.
    pub prize_split: PrizeSplit,
}

/// Prize split weights in basis points.
///
/// Together with the platform fee these sum to 10 000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrizeSplit {
    /// First place share.
    pub bps_1st: u16,
    /// Second place share (0 disables the slot).
    pub bps_2nd: u16,
    /// Third place share (0 disables the slot).
    pub bps_3rd: u16,
    /// Top-killer share (0 disables the slot).
    pub bps_kills: u16,
    /// Game creator share.
    pub bps_creator: u16,
}

/// A game's configuration plus live contract-side counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnchainGame {
    /// Static configuration.
    pub setup: GameSetup,
    /// Current contract-side phase.
    pub phase: OnchainPhase,
    /// Registered player count.
    pub player_count: u32,
    /// Escrow total in wei.
    pub total_collected: U256,
}

fn timestamp_utc(secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::try_from(secs).unwrap_or(i64::MAX), 0).unwrap_or_default()
}

impl GameSetup {
    /// Convert the ABI config struct into the coordinator-facing shape.
    #[must_use]
    pub fn from_abi(config: GameConfig) -> Self {
        let meeting_point = if config.meetingLat == 0 && config.meetingLng == 0 {
            None
        } else {
            Some((config.meetingLat, config.meetingLng))
        };
        Self {
            title: config.title,
            entry_fee: config.entryFee,
            min_players: config.minPlayers,
            max_players: config.maxPlayers,
            registration_deadline: timestamp_utc(config.registrationDeadline),
            game_date: timestamp_utc(config.gameDate),
            expiry_deadline: timestamp_utc(config.expiryDeadline),
            max_duration_seconds: config.maxDuration,
            zone_center: (config.zoneCenterLat, config.zoneCenterLng),
            meeting_point,
            prize_split: PrizeSplit {
                bps_1st: config.bps1st,
                bps_2nd: config.bps2nd,
                bps_3rd: config.bps3rd,
                bps_kills: config.bpsKills,
                bps_creator: config.bpsCreator,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READER PORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only access to settlement-contract state and events.
///
/// "Chain time" is the latest block's timestamp; lifecycle deadlines
/// (registration, expiry) are judged against it, never against the
/// coordinator's wall clock.
#[async_trait]
pub trait SettlementReader: Send + Sync {
    /// Latest block number.
    ///
    /// # Errors
    /// Returns an error if the node query fails.
    async fn latest_block(&self) -> Result<u64>;

    /// Latest block timestamp.
    ///
    /// # Errors
    /// Returns an error if the node query fails.
    async fn chain_time(&self) -> Result<DateTime<Utc>>;

    /// Fetch settlement events in the inclusive block range, ordered by
    /// `(block, log index)`.
    ///
    /// # Errors
    /// Returns an error if the node query or event decoding fails.
    async fn fetch_events(&self, from_block: u64, to_block: u64)
    -> Result<Vec<(u64, ChainEvent)>>;

    /// Read a game's configuration and live state.
    ///
    /// # Errors
    /// Returns an error if the view call fails or returns malformed data.
    async fn fetch_game(&self, game_id: u64) -> Result<OnchainGame>;

    /// Read a game's zone shrink schedule.
    ///
    /// # Errors
    /// Returns an error if the view call fails.
    async fn fetch_zone_shrinks(&self, game_id: u64) -> Result<Vec<ZoneShrinkSpec>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATOR PORT
// ═══════════════════════════════════════════════════════════════════════════════

/// The narrow state-changing surface the coordinator holds on the
/// settlement contract.
///
/// Every call submits one transaction and waits for its confirmation,
/// returning the transaction hash. Callers are expected to serialize
/// submissions (the coordinator's outbox does); implementations
/// additionally guard the shared operator wallet against concurrent
/// nonce use.
#[async_trait]
pub trait SettlementOperator: Send + Sync {
    /// Transition a subscribed game into the active phase.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn start_game(&self, game_id: u64) -> Result<TxHash>;

    /// Record a verified kill.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn record_kill(&self, game_id: u64, hunter: u16, target: u16) -> Result<TxHash>;

    /// Eliminate a player for a non-kill reason.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn eliminate_player(&self, game_id: u64, player: u16, reason: u8) -> Result<TxHash>;

    /// Submit the final result.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn end_game(
        &self,
        game_id: u64,
        winner1: u16,
        winner2: u16,
        winner3: u16,
        top_killer: u16,
    ) -> Result<TxHash>;

    /// Cancel an under-subscribed game.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn trigger_cancellation(&self, game_id: u64) -> Result<TxHash>;

    /// Expire a game whose check-in never completed.
    ///
    /// # Errors
    /// Returns an error if submission or confirmation fails.
    async fn trigger_expiry(&self, game_id: u64) -> Result<TxHash>;
}

/// Zero address constant for unfunded winner slots.
pub const ZERO_ADDRESS: Address = Address::ZERO;

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phase_roundtrip() {
        for (raw, phase) in [
            (0, OnchainPhase::Registration),
            (1, OnchainPhase::Active),
            (2, OnchainPhase::Ended),
            (3, OnchainPhase::Cancelled),
        ] {
            assert_eq!(OnchainPhase::try_from(raw).unwrap(), phase);
        }
        assert!(OnchainPhase::try_from(4).is_err());
    }

    #[test]
    fn zero_meeting_point_is_unset() {
        let setup = GameSetup::from_abi(GameConfig {
            title: "midnight run".into(),
            entryFee: U256::from(1),
            minPlayers: 3,
            maxPlayers: 10,
            registrationDeadline: 1_700_000_000,
            gameDate: 1_700_003_600,
            expiryDeadline: 1_700_007_200,
            maxDuration: 7200,
            zoneCenterLat: 52_520_008,
            zoneCenterLng: 13_404_954,
            meetingLat: 0,
            meetingLng: 0,
            bps1st: 3500,
            bps2nd: 1500,
            bps3rd: 1000,
            bpsKills: 2000,
            bpsCreator: 1000,
        });
        assert_eq!(setup.meeting_point, None);
        assert_eq!(setup.zone_center, (52_520_008, 13_404_954));
        assert_eq!(setup.registration_deadline.timestamp(), 1_700_000_000);
    }
}
