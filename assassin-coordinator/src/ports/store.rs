//! Storage port traits for data persistence.
//!
//! These traits define the contract for persisting and retrieving
//! domain entities. Infrastructure adapters implement these traits
//! using concrete storage backends (SQLite in production, an in-memory
//! map store for tests and ephemeral runs).
//!
//! The store is the coordinator's serialization point: every mutation a
//! broadcast announces is persisted through one of these traits first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::entities::{
    Game, HeartbeatScan, KillRecord, LocationPing, OperatorTx, Player, TargetAssignment,
    ZoneShrink,
};
use crate::types::enums::{GamePhase, SubPhase, TxStatus};
use crate::types::primitives::{BlockNumber, GameId, PlayerNumber, WalletAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// GAME STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for game and zone-shrink persistence.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert a newly created game with its configuration.
    ///
    /// # Errors
    /// Returns an error if the game already exists or the write fails.
    async fn insert_game(&self, game: &Game) -> Result<()>;

    /// Get a game by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn game(&self, game_id: GameId) -> Result<Option<Game>>;

    /// All games currently in the given phase.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn games_in_phase(&self, phase: GamePhase) -> Result<Vec<Game>>;

    /// Move a game into `ACTIVE.checkin`.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_active(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()>;

    /// Advance the sub-phase, persisting `sub_phase_started_at`.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_sub_phase(
        &self,
        game_id: GameId,
        sub_phase: SubPhase,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Finalize the game with winners (phase `ENDED`).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_ended(
        &self,
        game_id: GameId,
        at: DateTime<Utc>,
        winner1: Option<WalletAddress>,
        winner2: Option<WalletAddress>,
        winner3: Option<WalletAddress>,
        top_killer: Option<WalletAddress>,
    ) -> Result<()>;

    /// Mark the game cancelled (phase `CANCELLED`).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_cancelled(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()>;

    /// Refresh the registration counters.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn update_counters(
        &self,
        game_id: GameId,
        player_count: u32,
        total_collected: &str,
    ) -> Result<()>;

    /// Insert a game's zone shrink schedule.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_zone_shrinks(&self, game_id: GameId, shrinks: &[ZoneShrink]) -> Result<()>;

    /// A game's shrink schedule, ordered by `at_second`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn zone_shrinks(&self, game_id: GameId) -> Result<Vec<ZoneShrink>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for player persistence.
///
/// # Implementation Notes
///
/// Implementations must keep `checked_in` and `is_alive` monotonic: once
/// checked in never unchecked, once dead never alive.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Insert a newly registered player.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_player(&self, player: &Player) -> Result<()>;

    /// Get a player by address.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn player(&self, game_id: GameId, address: WalletAddress) -> Result<Option<Player>>;

    /// Get a player by number.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn player_by_number(
        &self,
        game_id: GameId,
        number: PlayerNumber,
    ) -> Result<Option<Player>>;

    /// All players of a game, ordered by player number.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn players(&self, game_id: GameId) -> Result<Vec<Player>>;

    /// Alive players of a game, ordered by player number.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn alive_players(&self, game_id: GameId) -> Result<Vec<Player>>;

    /// Alive player count.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn alive_count(&self, game_id: GameId) -> Result<u32>;

    /// Mark a player checked in (idempotent).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn mark_checked_in(&self, game_id: GameId, address: WalletAddress) -> Result<()>;

    /// Store a player's canonicalized Bluetooth token.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_bluetooth_token(
        &self,
        game_id: GameId,
        address: WalletAddress,
        token: &str,
    ) -> Result<()>;

    /// Eliminate a player: clears `is_alive`, sets `eliminated_at` and
    /// `eliminated_by` (hunter hex or sentinel reason).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn eliminate_player(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
        eliminated_by: &str,
    ) -> Result<()>;

    /// Increment a hunter's kill count, returning the new count.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn increment_kills(&self, game_id: GameId, address: WalletAddress) -> Result<u32>;

    /// Set one player's last heartbeat refresh.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_last_heartbeat(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Initialize every alive player's heartbeat to `at` (hunt start).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn init_heartbeats(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()>;

    /// Mark a player's prize/refund as claimed.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_has_claimed(&self, game_id: GameId, address: WalletAddress) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSIGNMENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for target-assignment persistence.
///
/// At most one row per hunter; the live rows of a game always mirror the
/// in-memory chain map.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Atomically replace a game's assignment rows (chain initialization).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn replace_assignments(
        &self,
        game_id: GameId,
        assignments: &[TargetAssignment],
    ) -> Result<()>;

    /// All assignment rows of a game.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn assignments(&self, game_id: GameId) -> Result<Vec<TargetAssignment>>;

    /// Insert or rewire one hunter's assignment.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn upsert_assignment(&self, assignment: &TargetAssignment) -> Result<()>;

    /// Delete one hunter's assignment row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn delete_assignment(&self, game_id: GameId, hunter: WalletAddress) -> Result<()>;

    /// Delete all assignment rows of a game (game end).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn clear_assignments(&self, game_id: GameId) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// KILL STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for kill audit rows.
#[async_trait]
pub trait KillStore: Send + Sync {
    /// Insert a kill record.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_kill(&self, kill: &KillRecord) -> Result<()>;

    /// All kills of a game, ordered by time.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn kills(&self, game_id: GameId) -> Result<Vec<KillRecord>>;

    /// Write the confirmed settlement tx hash into a kill row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_kill_tx_hash(&self, kill_id: Uuid, tx_hash: &str) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for location pings.
///
/// Most-recent-wins per `(game, address)` plus a short history used for
/// recovery; old history is pruned by the game tick.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Record a ping.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn record_ping(&self, ping: &LocationPing) -> Result<()>;

    /// A player's most recent ping.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn latest_ping(
        &self,
        game_id: GameId,
        address: WalletAddress,
    ) -> Result<Option<LocationPing>>;

    /// The most recent ping of every player in the game.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn latest_pings(&self, game_id: GameId) -> Result<Vec<LocationPing>>;

    /// Drop history rows older than `cutoff`, keeping each player's latest.
    /// Returns the number of dropped rows.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn prune_pings_before(&self, game_id: GameId, cutoff: DateTime<Utc>) -> Result<u64>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEARTBEAT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for heartbeat scan records.
#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    /// Append a successful mutual-scan record.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_heartbeat_scan(&self, scan: &HeartbeatScan) -> Result<()>;

    /// All heartbeat scans of a game, ordered by time.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn heartbeat_scans(&self, game_id: GameId) -> Result<Vec<HeartbeatScan>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTBOX STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the operator transaction outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a pending outbox row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_operator_tx(&self, tx: &OperatorTx) -> Result<()>;

    /// Resolve an outbox row to its final status.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn resolve_operator_tx(
        &self,
        id: Uuid,
        status: TxStatus,
        tx_hash: Option<&str>,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// All outbox rows of a game, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn operator_txs(&self, game_id: GameId) -> Result<Vec<OperatorTx>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURSOR STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the chain sync cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The last block whose events have been processed (0 if none).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn sync_cursor(&self) -> Result<BlockNumber>;

    /// Advance the cursor.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn set_sync_cursor(&self, block: BlockNumber) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMBINED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// The full store surface the coordinator holds.
pub trait Store:
    GameStore
    + PlayerStore
    + AssignmentStore
    + KillStore
    + LocationStore
    + HeartbeatStore
    + OutboxStore
    + CursorStore
{
}

impl<T> Store for T where
    T: GameStore
        + PlayerStore
        + AssignmentStore
        + KillStore
        + LocationStore
        + HeartbeatStore
        + OutboxStore
        + CursorStore
{
}
