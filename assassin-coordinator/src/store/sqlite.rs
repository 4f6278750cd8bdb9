//! SQLite implementation of the store ports using SQLx.
//!
//! # Type Conversions
//!
//! SQLite stores signed integers; domain counters are unsigned and
//! timestamps are `DateTime<Utc>`. Rows carry i64 columns and convert at
//! the edge:
//! - timestamps ↔ unix seconds
//! - addresses ↔ lowercase 0x-hex TEXT
//! - wei amounts ↔ decimal TEXT (no arithmetic happens off-chain)
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{InfraError, Result};
use crate::ports::store::{
    AssignmentStore, CursorStore, GameStore, HeartbeatStore, KillStore, LocationStore,
    OutboxStore, PlayerStore,
};
use crate::types::entities::{
    Game, HeartbeatScan, KillRecord, LocationPing, OperatorTx, Player, TargetAssignment,
    ZoneShrink,
};
use crate::types::enums::{GamePhase, OperatorAction, SubPhase, TxStatus};
use crate::types::primitives::{BlockNumber, GameId, PlayerNumber, WalletAddress};
use settlement_client::PrizeSplit;

/// Bootstrap schema, executed idempotently at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id                   INTEGER PRIMARY KEY,
    title                TEXT NOT NULL,
    entry_fee            TEXT NOT NULL,
    min_players          INTEGER NOT NULL,
    max_players          INTEGER NOT NULL,
    registration_deadline INTEGER NOT NULL,
    game_date            INTEGER NOT NULL,
    expiry_deadline      INTEGER NOT NULL,
    max_duration_seconds INTEGER NOT NULL,
    zone_center_lat      INTEGER NOT NULL,
    zone_center_lng      INTEGER NOT NULL,
    meeting_lat          INTEGER,
    meeting_lng          INTEGER,
    bps_1st              INTEGER NOT NULL,
    bps_2nd              INTEGER NOT NULL,
    bps_3rd              INTEGER NOT NULL,
    bps_kills            INTEGER NOT NULL,
    bps_creator          INTEGER NOT NULL,
    player_count         INTEGER NOT NULL DEFAULT 0,
    total_collected      TEXT NOT NULL DEFAULT '0',
    phase                TEXT NOT NULL,
    sub_phase            TEXT,
    started_at           INTEGER,
    sub_phase_started_at INTEGER,
    ended_at             INTEGER,
    winner1              TEXT,
    winner2              TEXT,
    winner3              TEXT,
    top_killer           TEXT
);

CREATE TABLE IF NOT EXISTS zone_shrinks (
    game_id       INTEGER NOT NULL REFERENCES games(id),
    at_second     INTEGER NOT NULL,
    radius_meters INTEGER NOT NULL,
    PRIMARY KEY (game_id, at_second)
);

CREATE TABLE IF NOT EXISTS players (
    game_id           INTEGER NOT NULL REFERENCES games(id),
    address           TEXT NOT NULL,
    number            INTEGER NOT NULL,
    is_alive          INTEGER NOT NULL DEFAULT 1,
    kills             INTEGER NOT NULL DEFAULT 0,
    eliminated_at     INTEGER,
    eliminated_by     TEXT,
    checked_in        INTEGER NOT NULL DEFAULT 0,
    bluetooth_token   TEXT,
    last_heartbeat_at INTEGER,
    has_claimed       INTEGER NOT NULL DEFAULT 0,
    registered_at     INTEGER NOT NULL,
    PRIMARY KEY (game_id, address),
    UNIQUE (game_id, number)
);

CREATE TABLE IF NOT EXISTS target_assignments (
    game_id     INTEGER NOT NULL REFERENCES games(id),
    hunter      TEXT NOT NULL,
    target      TEXT NOT NULL,
    assigned_at INTEGER NOT NULL,
    PRIMARY KEY (game_id, hunter)
);

CREATE TABLE IF NOT EXISTS kills (
    id              TEXT PRIMARY KEY,
    game_id         INTEGER NOT NULL REFERENCES games(id),
    hunter          TEXT NOT NULL,
    target          TEXT NOT NULL,
    occurred_at     INTEGER NOT NULL,
    hunter_lat      REAL NOT NULL,
    hunter_lng      REAL NOT NULL,
    target_lat      REAL NOT NULL,
    target_lng      REAL NOT NULL,
    distance_meters REAL NOT NULL,
    tx_hash         TEXT
);

CREATE TABLE IF NOT EXISTS location_pings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id     INTEGER NOT NULL,
    address     TEXT NOT NULL,
    lat         REAL NOT NULL,
    lng         REAL NOT NULL,
    recorded_at INTEGER NOT NULL,
    in_zone     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pings_game_addr
    ON location_pings (game_id, address, recorded_at);

CREATE TABLE IF NOT EXISTS heartbeat_scans (
    id          TEXT PRIMARY KEY,
    game_id     INTEGER NOT NULL,
    scanner     TEXT NOT NULL,
    scanned     TEXT NOT NULL,
    occurred_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS operator_txs (
    id         TEXT PRIMARY KEY,
    game_id    INTEGER NOT NULL,
    action     TEXT NOT NULL,
    status     TEXT NOT NULL,
    tx_hash    TEXT,
    error      TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_cursor (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    last_block INTEGER NOT NULL
);
"#;

// ═══════════════════════════════════════════════════════════════════════════════
// SQLITE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and bootstrap
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or schema creation
    /// fails.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(InfraError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(InfraError::Database)?;

        let store = Self { pool };
        store.init_schema().await?;
        debug!(path, "Opened SQLite store");
        Ok(store)
    }

    /// Open an in-memory database (tests, ephemeral runs).
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(InfraError::Database)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROW TYPES
// ═══════════════════════════════════════════════════════════════════════════════

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn opt_ts(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(ts)
}

fn addr(hex: &str) -> std::result::Result<WalletAddress, InfraError> {
    WalletAddress::from_hex(hex)
        .map_err(|e| InfraError::CorruptData(format!("address '{hex}': {e}")))
}

fn opt_addr(hex: Option<&str>) -> std::result::Result<Option<WalletAddress>, InfraError> {
    hex.map(addr).transpose()
}

#[derive(Debug, FromRow)]
struct GameRow {
    id: i64,
    title: String,
    entry_fee: String,
    min_players: i64,
    max_players: i64,
    registration_deadline: i64,
    game_date: i64,
    expiry_deadline: i64,
    max_duration_seconds: i64,
    zone_center_lat: i64,
    zone_center_lng: i64,
    meeting_lat: Option<i64>,
    meeting_lng: Option<i64>,
    bps_1st: i64,
    bps_2nd: i64,
    bps_3rd: i64,
    bps_kills: i64,
    bps_creator: i64,
    player_count: i64,
    total_collected: String,
    phase: String,
    sub_phase: Option<String>,
    started_at: Option<i64>,
    sub_phase_started_at: Option<i64>,
    ended_at: Option<i64>,
    winner1: Option<String>,
    winner2: Option<String>,
    winner3: Option<String>,
    top_killer: Option<String>,
}

impl TryFrom<GameRow> for Game {
    type Error = InfraError;

    fn try_from(row: GameRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: GameId::new(row.id as u64),
            title: row.title,
            entry_fee: row.entry_fee,
            min_players: row.min_players as u32,
            max_players: row.max_players as u32,
            registration_deadline: ts(row.registration_deadline),
            game_date: ts(row.game_date),
            expiry_deadline: ts(row.expiry_deadline),
            max_duration_seconds: row.max_duration_seconds as u64,
            zone_center_lat: row.zone_center_lat as i32,
            zone_center_lng: row.zone_center_lng as i32,
            meeting_lat: row.meeting_lat.map(|v| v as i32),
            meeting_lng: row.meeting_lng.map(|v| v as i32),
            prize_split: PrizeSplit {
                bps_1st: row.bps_1st as u16,
                bps_2nd: row.bps_2nd as u16,
                bps_3rd: row.bps_3rd as u16,
                bps_kills: row.bps_kills as u16,
                bps_creator: row.bps_creator as u16,
            },
            player_count: row.player_count as u32,
            total_collected: row.total_collected,
            phase: row
                .phase
                .parse::<GamePhase>()
                .map_err(|e| InfraError::CorruptData(e.to_string()))?,
            sub_phase: row
                .sub_phase
                .as_deref()
                .map(str::parse::<SubPhase>)
                .transpose()
                .map_err(|e| InfraError::CorruptData(e.to_string()))?,
            started_at: opt_ts(row.started_at),
            sub_phase_started_at: opt_ts(row.sub_phase_started_at),
            ended_at: opt_ts(row.ended_at),
            winner1: opt_addr(row.winner1.as_deref())?,
            winner2: opt_addr(row.winner2.as_deref())?,
            winner3: opt_addr(row.winner3.as_deref())?,
            top_killer: opt_addr(row.top_killer.as_deref())?,
        })
    }
}

#[derive(Debug, FromRow)]
struct PlayerRow {
    game_id: i64,
    address: String,
    number: i64,
    is_alive: bool,
    kills: i64,
    eliminated_at: Option<i64>,
    eliminated_by: Option<String>,
    checked_in: bool,
    bluetooth_token: Option<String>,
    last_heartbeat_at: Option<i64>,
    has_claimed: bool,
    registered_at: i64,
}

impl TryFrom<PlayerRow> for Player {
    type Error = InfraError;

    fn try_from(row: PlayerRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            game_id: GameId::new(row.game_id as u64),
            address: addr(&row.address)?,
            number: PlayerNumber::new(row.number as u16)
                .map_err(|e| InfraError::CorruptData(e.to_string()))?,
            is_alive: row.is_alive,
            kills: row.kills as u32,
            eliminated_at: opt_ts(row.eliminated_at),
            eliminated_by: row.eliminated_by,
            checked_in: row.checked_in,
            bluetooth_token: row.bluetooth_token,
            last_heartbeat_at: opt_ts(row.last_heartbeat_at),
            has_claimed: row.has_claimed,
            registered_at: ts(row.registered_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    game_id: i64,
    hunter: String,
    target: String,
    assigned_at: i64,
}

impl TryFrom<AssignmentRow> for TargetAssignment {
    type Error = InfraError;

    fn try_from(row: AssignmentRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            game_id: GameId::new(row.game_id as u64),
            hunter: addr(&row.hunter)?,
            target: addr(&row.target)?,
            assigned_at: ts(row.assigned_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct KillRow {
    id: String,
    game_id: i64,
    hunter: String,
    target: String,
    occurred_at: i64,
    hunter_lat: f64,
    hunter_lng: f64,
    target_lat: f64,
    target_lng: f64,
    distance_meters: f64,
    tx_hash: Option<String>,
}

impl TryFrom<KillRow> for KillRecord {
    type Error = InfraError;

    fn try_from(row: KillRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| InfraError::CorruptData(format!("kill id: {e}")))?,
            game_id: GameId::new(row.game_id as u64),
            hunter: addr(&row.hunter)?,
            target: addr(&row.target)?,
            occurred_at: ts(row.occurred_at),
            hunter_lat: row.hunter_lat,
            hunter_lng: row.hunter_lng,
            target_lat: row.target_lat,
            target_lng: row.target_lng,
            distance_meters: row.distance_meters,
            tx_hash: row.tx_hash,
        })
    }
}

#[derive(Debug, FromRow)]
struct PingRow {
    game_id: i64,
    address: String,
    lat: f64,
    lng: f64,
    recorded_at: i64,
    in_zone: bool,
}

impl TryFrom<PingRow> for LocationPing {
    type Error = InfraError;

    fn try_from(row: PingRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            game_id: GameId::new(row.game_id as u64),
            address: addr(&row.address)?,
            lat: row.lat,
            lng: row.lng,
            recorded_at: ts(row.recorded_at),
            in_zone: row.in_zone,
        })
    }
}

#[derive(Debug, FromRow)]
struct OperatorTxRow {
    id: String,
    game_id: i64,
    action: String,
    status: String,
    tx_hash: Option<String>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OperatorTxRow> for OperatorTx {
    type Error = InfraError;

    fn try_from(row: OperatorTxRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| InfraError::CorruptData(format!("outbox id: {e}")))?,
            game_id: GameId::new(row.game_id as u64),
            action: row
                .action
                .parse::<OperatorAction>()
                .map_err(|e| InfraError::CorruptData(e.to_string()))?,
            status: row
                .status
                .parse::<TxStatus>()
                .map_err(|e| InfraError::CorruptData(e.to_string()))?,
            tx_hash: row.tx_hash,
            error: row.error,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl GameStore for SqliteStore {
    #[instrument(skip(self, game), fields(game_id = %game.id))]
    async fn insert_game(&self, game: &Game) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO games (
                id, title, entry_fee, min_players, max_players,
                registration_deadline, game_date, expiry_deadline,
                max_duration_seconds, zone_center_lat, zone_center_lng,
                meeting_lat, meeting_lng,
                bps_1st, bps_2nd, bps_3rd, bps_kills, bps_creator,
                player_count, total_collected, phase, sub_phase,
                started_at, sub_phase_started_at, ended_at,
                winner1, winner2, winner3, top_killer
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                      ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(game.id.get() as i64)
        .bind(&game.title)
        .bind(&game.entry_fee)
        .bind(i64::from(game.min_players))
        .bind(i64::from(game.max_players))
        .bind(game.registration_deadline.timestamp())
        .bind(game.game_date.timestamp())
        .bind(game.expiry_deadline.timestamp())
        .bind(game.max_duration_seconds as i64)
        .bind(i64::from(game.zone_center_lat))
        .bind(i64::from(game.zone_center_lng))
        .bind(game.meeting_lat.map(i64::from))
        .bind(game.meeting_lng.map(i64::from))
        .bind(i64::from(game.prize_split.bps_1st))
        .bind(i64::from(game.prize_split.bps_2nd))
        .bind(i64::from(game.prize_split.bps_3rd))
        .bind(i64::from(game.prize_split.bps_kills))
        .bind(i64::from(game.prize_split.bps_creator))
        .bind(i64::from(game.player_count))
        .bind(&game.total_collected)
        .bind(game.phase.as_str())
        .bind(game.sub_phase.map(|s| s.as_str()))
        .bind(game.started_at.map(|t| t.timestamp()))
        .bind(game.sub_phase_started_at.map(|t| t.timestamp()))
        .bind(game.ended_at.map(|t| t.timestamp()))
        .bind(game.winner1.map(|a| a.to_hex()))
        .bind(game.winner2.map(|a| a.to_hex()))
        .bind(game.winner3.map(|a| a.to_hex()))
        .bind(game.top_killer.map(|a| a.to_hex()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn game(&self, game_id: GameId) -> Result<Option<Game>> {
        let row = sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE id = ?")
            .bind(game_id.get() as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Game::try_from).transpose().map_err(Into::into)
    }

    async fn games_in_phase(&self, phase: GamePhase) -> Result<Vec<Game>> {
        let rows = sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE phase = ? ORDER BY id")
            .bind(phase.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Game::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn set_active(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE games SET phase = 'ACTIVE', sub_phase = 'checkin', \
             started_at = ?, sub_phase_started_at = ? WHERE id = ?",
        )
        .bind(at.timestamp())
        .bind(at.timestamp())
        .bind(game_id.get() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_sub_phase(
        &self,
        game_id: GameId,
        sub_phase: SubPhase,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE games SET sub_phase = ?, sub_phase_started_at = ? WHERE id = ?")
            .bind(sub_phase.as_str())
            .bind(at.timestamp())
            .bind(game_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_ended(
        &self,
        game_id: GameId,
        at: DateTime<Utc>,
        winner1: Option<WalletAddress>,
        winner2: Option<WalletAddress>,
        winner3: Option<WalletAddress>,
        top_killer: Option<WalletAddress>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE games SET phase = 'ENDED', sub_phase = NULL, ended_at = ?, \
             winner1 = ?, winner2 = ?, winner3 = ?, top_killer = ? WHERE id = ?",
        )
        .bind(at.timestamp())
        .bind(winner1.map(|a| a.to_hex()))
        .bind(winner2.map(|a| a.to_hex()))
        .bind(winner3.map(|a| a.to_hex()))
        .bind(top_killer.map(|a| a.to_hex()))
        .bind(game_id.get() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_cancelled(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE games SET phase = 'CANCELLED', sub_phase = NULL, ended_at = ? WHERE id = ?",
        )
        .bind(at.timestamp())
        .bind(game_id.get() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_counters(
        &self,
        game_id: GameId,
        player_count: u32,
        total_collected: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE games SET player_count = ?, total_collected = ? WHERE id = ?")
            .bind(i64::from(player_count))
            .bind(total_collected)
            .bind(game_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_zone_shrinks(&self, game_id: GameId, shrinks: &[ZoneShrink]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for shrink in shrinks {
            sqlx::query(
                "INSERT OR REPLACE INTO zone_shrinks (game_id, at_second, radius_meters) \
                 VALUES (?, ?, ?)",
            )
            .bind(game_id.get() as i64)
            .bind(i64::from(shrink.at_second))
            .bind(i64::from(shrink.radius_meters))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn zone_shrinks(&self, game_id: GameId) -> Result<Vec<ZoneShrink>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT at_second, radius_meters FROM zone_shrinks \
             WHERE game_id = ? ORDER BY at_second",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(at_second, radius_meters)| ZoneShrink {
                game_id,
                at_second: at_second as u32,
                radius_meters: radius_meters as u32,
            })
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl PlayerStore for SqliteStore {
    async fn insert_player(&self, player: &Player) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO players (
                game_id, address, number, is_alive, kills, eliminated_at,
                eliminated_by, checked_in, bluetooth_token, last_heartbeat_at,
                has_claimed, registered_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(player.game_id.get() as i64)
        .bind(player.address.to_hex())
        .bind(i64::from(player.number.get()))
        .bind(player.is_alive)
        .bind(i64::from(player.kills))
        .bind(player.eliminated_at.map(|t| t.timestamp()))
        .bind(&player.eliminated_by)
        .bind(player.checked_in)
        .bind(&player.bluetooth_token)
        .bind(player.last_heartbeat_at.map(|t| t.timestamp()))
        .bind(player.has_claimed)
        .bind(player.registered_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn player(&self, game_id: GameId, address: WalletAddress) -> Result<Option<Player>> {
        let row = sqlx::query_as::<_, PlayerRow>(
            "SELECT * FROM players WHERE game_id = ? AND address = ?",
        )
        .bind(game_id.get() as i64)
        .bind(address.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Player::try_from).transpose().map_err(Into::into)
    }

    async fn player_by_number(
        &self,
        game_id: GameId,
        number: PlayerNumber,
    ) -> Result<Option<Player>> {
        let row = sqlx::query_as::<_, PlayerRow>(
            "SELECT * FROM players WHERE game_id = ? AND number = ?",
        )
        .bind(game_id.get() as i64)
        .bind(i64::from(number.get()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Player::try_from).transpose().map_err(Into::into)
    }

    async fn players(&self, game_id: GameId) -> Result<Vec<Player>> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT * FROM players WHERE game_id = ? ORDER BY number",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Player::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn alive_players(&self, game_id: GameId) -> Result<Vec<Player>> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT * FROM players WHERE game_id = ? AND is_alive = 1 ORDER BY number",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Player::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn alive_count(&self, game_id: GameId) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM players WHERE game_id = ? AND is_alive = 1",
        )
        .bind(game_id.get() as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }

    async fn mark_checked_in(&self, game_id: GameId, address: WalletAddress) -> Result<()> {
        sqlx::query("UPDATE players SET checked_in = 1 WHERE game_id = ? AND address = ?")
            .bind(game_id.get() as i64)
            .bind(address.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_bluetooth_token(
        &self,
        game_id: GameId,
        address: WalletAddress,
        token: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE players SET bluetooth_token = ? WHERE game_id = ? AND address = ?")
            .bind(token)
            .bind(game_id.get() as i64)
            .bind(address.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn eliminate_player(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
        eliminated_by: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE players SET is_alive = 0, eliminated_at = ?, eliminated_by = ? \
             WHERE game_id = ? AND address = ? AND is_alive = 1",
        )
        .bind(at.timestamp())
        .bind(eliminated_by)
        .bind(game_id.get() as i64)
        .bind(address.to_hex())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_kills(&self, game_id: GameId, address: WalletAddress) -> Result<u32> {
        let kills: i64 = sqlx::query_scalar(
            "UPDATE players SET kills = kills + 1 \
             WHERE game_id = ? AND address = ? RETURNING kills",
        )
        .bind(game_id.get() as i64)
        .bind(address.to_hex())
        .fetch_one(&self.pool)
        .await?;
        Ok(kills as u32)
    }

    async fn set_last_heartbeat(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE players SET last_heartbeat_at = ? WHERE game_id = ? AND address = ?")
            .bind(at.timestamp())
            .bind(game_id.get() as i64)
            .bind(address.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn init_heartbeats(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE players SET last_heartbeat_at = ? WHERE game_id = ? AND is_alive = 1")
            .bind(at.timestamp())
            .bind(game_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_has_claimed(&self, game_id: GameId, address: WalletAddress) -> Result<()> {
        sqlx::query("UPDATE players SET has_claimed = 1 WHERE game_id = ? AND address = ?")
            .bind(game_id.get() as i64)
            .bind(address.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSIGNMENT STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl AssignmentStore for SqliteStore {
    async fn replace_assignments(
        &self,
        game_id: GameId,
        assignments: &[TargetAssignment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM target_assignments WHERE game_id = ?")
            .bind(game_id.get() as i64)
            .execute(&mut *tx)
            .await?;
        for assignment in assignments {
            sqlx::query(
                "INSERT INTO target_assignments (game_id, hunter, target, assigned_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(game_id.get() as i64)
            .bind(assignment.hunter.to_hex())
            .bind(assignment.target.to_hex())
            .bind(assignment.assigned_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn assignments(&self, game_id: GameId) -> Result<Vec<TargetAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT * FROM target_assignments WHERE game_id = ? ORDER BY hunter",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| TargetAssignment::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn upsert_assignment(&self, assignment: &TargetAssignment) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO target_assignments (game_id, hunter, target, assigned_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(assignment.game_id.get() as i64)
        .bind(assignment.hunter.to_hex())
        .bind(assignment.target.to_hex())
        .bind(assignment.assigned_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_assignment(&self, game_id: GameId, hunter: WalletAddress) -> Result<()> {
        sqlx::query("DELETE FROM target_assignments WHERE game_id = ? AND hunter = ?")
            .bind(game_id.get() as i64)
            .bind(hunter.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_assignments(&self, game_id: GameId) -> Result<()> {
        sqlx::query("DELETE FROM target_assignments WHERE game_id = ?")
            .bind(game_id.get() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KILL / LOCATION / HEARTBEAT / OUTBOX / CURSOR IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl KillStore for SqliteStore {
    async fn insert_kill(&self, kill: &KillRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kills (
                id, game_id, hunter, target, occurred_at,
                hunter_lat, hunter_lng, target_lat, target_lng,
                distance_meters, tx_hash
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kill.id.to_string())
        .bind(kill.game_id.get() as i64)
        .bind(kill.hunter.to_hex())
        .bind(kill.target.to_hex())
        .bind(kill.occurred_at.timestamp())
        .bind(kill.hunter_lat)
        .bind(kill.hunter_lng)
        .bind(kill.target_lat)
        .bind(kill.target_lng)
        .bind(kill.distance_meters)
        .bind(&kill.tx_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn kills(&self, game_id: GameId) -> Result<Vec<KillRecord>> {
        let rows = sqlx::query_as::<_, KillRow>(
            "SELECT * FROM kills WHERE game_id = ? ORDER BY occurred_at, id",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| KillRecord::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn set_kill_tx_hash(&self, kill_id: Uuid, tx_hash: &str) -> Result<()> {
        sqlx::query("UPDATE kills SET tx_hash = ? WHERE id = ?")
            .bind(tx_hash)
            .bind(kill_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LocationStore for SqliteStore {
    async fn record_ping(&self, ping: &LocationPing) -> Result<()> {
        sqlx::query(
            "INSERT INTO location_pings (game_id, address, lat, lng, recorded_at, in_zone) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(ping.game_id.get() as i64)
        .bind(ping.address.to_hex())
        .bind(ping.lat)
        .bind(ping.lng)
        .bind(ping.recorded_at.timestamp())
        .bind(ping.in_zone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_ping(
        &self,
        game_id: GameId,
        address: WalletAddress,
    ) -> Result<Option<LocationPing>> {
        let row = sqlx::query_as::<_, PingRow>(
            "SELECT game_id, address, lat, lng, recorded_at, in_zone FROM location_pings \
             WHERE game_id = ? AND address = ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(game_id.get() as i64)
        .bind(address.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.map(LocationPing::try_from)
            .transpose()
            .map_err(Into::into)
    }

    async fn latest_pings(&self, game_id: GameId) -> Result<Vec<LocationPing>> {
        let rows = sqlx::query_as::<_, PingRow>(
            r#"
            SELECT lp.game_id, lp.address, lp.lat, lp.lng, lp.recorded_at, lp.in_zone
            FROM location_pings lp
            WHERE lp.game_id = ?1 AND lp.id = (
                SELECT lp2.id FROM location_pings lp2
                WHERE lp2.game_id = ?1 AND lp2.address = lp.address
                ORDER BY lp2.recorded_at DESC, lp2.id DESC LIMIT 1
            )
            ORDER BY lp.address
            "#,
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| LocationPing::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn prune_pings_before(&self, game_id: GameId, cutoff: DateTime<Utc>) -> Result<u64> {
        // Each player's latest ping survives pruning even when stale;
        // recovery reseeds the zone tracker from it.
        let result = sqlx::query(
            r#"
            DELETE FROM location_pings
            WHERE game_id = ?1 AND recorded_at < ?2 AND id NOT IN (
                SELECT lp.id FROM location_pings lp
                WHERE lp.game_id = ?1 AND lp.id = (
                    SELECT lp2.id FROM location_pings lp2
                    WHERE lp2.game_id = ?1 AND lp2.address = lp.address
                    ORDER BY lp2.recorded_at DESC, lp2.id DESC LIMIT 1
                )
            )
            "#,
        )
        .bind(game_id.get() as i64)
        .bind(cutoff.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HeartbeatStore for SqliteStore {
    async fn insert_heartbeat_scan(&self, scan: &HeartbeatScan) -> Result<()> {
        sqlx::query(
            "INSERT INTO heartbeat_scans (id, game_id, scanner, scanned, occurred_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(scan.id.to_string())
        .bind(scan.game_id.get() as i64)
        .bind(scan.scanner.to_hex())
        .bind(scan.scanned.to_hex())
        .bind(scan.occurred_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn heartbeat_scans(&self, game_id: GameId) -> Result<Vec<HeartbeatScan>> {
        let rows: Vec<(String, i64, String, String, i64)> = sqlx::query_as(
            "SELECT id, game_id, scanner, scanned, occurred_at FROM heartbeat_scans \
             WHERE game_id = ? ORDER BY occurred_at, id",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, game_id, scanner, scanned, occurred_at)| {
                Ok(HeartbeatScan {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| InfraError::CorruptData(format!("scan id: {e}")))?,
                    game_id: GameId::new(game_id as u64),
                    scanner: addr(&scanner)?,
                    scanned: addr(&scanned)?,
                    occurred_at: ts(occurred_at),
                })
            })
            .collect::<std::result::Result<Vec<_>, InfraError>>()
            .map_err(Into::into)
    }
}

#[async_trait]
impl OutboxStore for SqliteStore {
    async fn insert_operator_tx(&self, tx: &OperatorTx) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO operator_txs (id, game_id, action, status, tx_hash, error,
                                      created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id.to_string())
        .bind(tx.game_id.get() as i64)
        .bind(tx.action.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.tx_hash)
        .bind(&tx.error)
        .bind(tx.created_at.timestamp())
        .bind(tx.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve_operator_tx(
        &self,
        id: Uuid,
        status: TxStatus,
        tx_hash: Option<&str>,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE operator_txs SET status = ?, tx_hash = ?, error = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(tx_hash)
        .bind(error)
        .bind(at.timestamp())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn operator_txs(&self, game_id: GameId) -> Result<Vec<OperatorTx>> {
        let rows = sqlx::query_as::<_, OperatorTxRow>(
            "SELECT * FROM operator_txs WHERE game_id = ? ORDER BY created_at, id",
        )
        .bind(game_id.get() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| OperatorTx::try_from(r).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl CursorStore for SqliteStore {
    async fn sync_cursor(&self) -> Result<BlockNumber> {
        let row: Option<i64> =
            sqlx::query_scalar("SELECT last_block FROM sync_cursor WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(BlockNumber::new(row.unwrap_or(0) as u64))
    }

    async fn set_sync_cursor(&self, block: BlockNumber) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_cursor (id, last_block) VALUES (1, ?) \
             ON CONFLICT (id) DO UPDATE SET last_block = excluded.last_block",
        )
        .bind(block.get() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_game() -> Game {
        Game {
            id: GameId::new(1),
            title: "midnight run".into(),
            entry_fee: "10000000000000000".into(),
            min_players: 3,
            max_players: 10,
            registration_deadline: ts(1_700_000_000),
            game_date: ts(1_700_003_600),
            expiry_deadline: ts(1_700_007_200),
            max_duration_seconds: 7200,
            zone_center_lat: 52_520_008,
            zone_center_lng: 13_404_954,
            meeting_lat: Some(52_521_000),
            meeting_lng: Some(13_405_000),
            prize_split: PrizeSplit {
                bps_1st: 3500,
                bps_2nd: 1500,
                bps_3rd: 1000,
                bps_kills: 2000,
                bps_creator: 1000,
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

    fn sample_player(number: u16) -> Player {
        Player {
            game_id: GameId::new(1),
            address: WalletAddress::new([u8::try_from(number).unwrap(); 20]),
            number: PlayerNumber::new(number).unwrap(),
            is_alive: true,
            kills: 0,
            eliminated_at: None,
            eliminated_by: None,
            checked_in: false,
            bluetooth_token: None,
            last_heartbeat_at: None,
            has_claimed: false,
            registered_at: ts(1_699_999_000),
        }
    }

    #[tokio::test]
    async fn game_roundtrip() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let game = sample_game();
        store.insert_game(&game).await.unwrap();

        let loaded = store.game(GameId::new(1)).await.unwrap().unwrap();
        assert_eq!(loaded, game);
        assert!(store.game(GameId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn phase_transitions_persist() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_game(&sample_game()).await.unwrap();

        let at = ts(1_700_004_000);
        store.set_active(GameId::new(1), at).await.unwrap();
        let game = store.game(GameId::new(1)).await.unwrap().unwrap();
        assert_eq!(game.phase, GamePhase::Active);
        assert_eq!(game.sub_phase, Some(SubPhase::Checkin));
        assert_eq!(game.started_at, Some(at));

        store
            .set_sub_phase(GameId::new(1), SubPhase::Game, ts(1_700_005_000))
            .await
            .unwrap();
        let game = store.game(GameId::new(1)).await.unwrap().unwrap();
        assert_eq!(game.sub_phase, Some(SubPhase::Game));
        assert_eq!(game.sub_phase_started_at, Some(ts(1_700_005_000)));
    }

    #[tokio::test]
    async fn player_elimination_and_kills() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_game(&sample_game()).await.unwrap();
        store.insert_player(&sample_player(1)).await.unwrap();
        store.insert_player(&sample_player(2)).await.unwrap();

        let hunter = sample_player(1).address;
        let victim = sample_player(2).address;

        let kills = store.increment_kills(GameId::new(1), hunter).await.unwrap();
        assert_eq!(kills, 1);

        store
            .eliminate_player(GameId::new(1), victim, ts(1_700_005_500), &hunter.to_hex())
            .await
            .unwrap();
        assert_eq!(store.alive_count(GameId::new(1)).await.unwrap(), 1);

        let p2 = store
            .player(GameId::new(1), victim)
            .await
            .unwrap()
            .unwrap();
        assert!(!p2.is_alive);
        assert_eq!(p2.eliminated_by, Some(hunter.to_hex()));
    }

    #[tokio::test]
    async fn latest_ping_and_prune() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let address = WalletAddress::new([7; 20]);
        for i in 0..3_i64 {
            store
                .record_ping(&LocationPing {
                    game_id: GameId::new(1),
                    address,
                    lat: f64::from(i32::try_from(i).unwrap()),
                    lng: 0.0,
                    recorded_at: ts(1_700_000_000 + i),
                    in_zone: true,
                })
                .await
                .unwrap();
        }

        let latest = store
            .latest_ping(GameId::new(1), address)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.recorded_at, ts(1_700_000_002));

        let dropped = store
            .prune_pings_before(GameId::new(1), ts(1_700_001_000))
            .await
            .unwrap();
        assert_eq!(dropped, 2);
        // The latest survives even though it is older than the cutoff.
        assert!(
            store
                .latest_ping(GameId::new(1), address)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn assignment_replace_and_delete() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.insert_game(&sample_game()).await.unwrap();
        let a = WalletAddress::new([1; 20]);
        let b = WalletAddress::new([2; 20]);
        let rows = vec![
            TargetAssignment {
                game_id: GameId::new(1),
                hunter: a,
                target: b,
                assigned_at: ts(1_700_000_000),
            },
            TargetAssignment {
                game_id: GameId::new(1),
                hunter: b,
                target: a,
                assigned_at: ts(1_700_000_000),
            },
        ];
        store.replace_assignments(GameId::new(1), &rows).await.unwrap();
        assert_eq!(store.assignments(GameId::new(1)).await.unwrap().len(), 2);

        store.delete_assignment(GameId::new(1), a).await.unwrap();
        assert_eq!(store.assignments(GameId::new(1)).await.unwrap().len(), 1);

        store.clear_assignments(GameId::new(1)).await.unwrap();
        assert!(store.assignments(GameId::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cursor_upsert() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(store.sync_cursor().await.unwrap().get(), 0);
        store.set_sync_cursor(BlockNumber::new(10)).await.unwrap();
        store.set_sync_cursor(BlockNumber::new(20)).await.unwrap();
        assert_eq!(store.sync_cursor().await.unwrap().get(), 20);
    }
}
