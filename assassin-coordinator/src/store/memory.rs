//! In-memory store for tests and ephemeral runs.
//!
//! A straight map-based implementation of every store port. All methods
//! take one lock, mutate, and return, so the async signatures never hold
//! the lock across an await point.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
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
use crate::types::enums::{GamePhase, SubPhase, TxStatus};
use crate::types::primitives::{BlockNumber, GameId, PlayerNumber, WalletAddress};

#[derive(Debug, Default)]
struct Inner {
    games: HashMap<GameId, Game>,
    shrinks: HashMap<GameId, Vec<ZoneShrink>>,
    players: HashMap<GameId, BTreeMap<PlayerNumber, Player>>,
    assignments: HashMap<GameId, HashMap<WalletAddress, TargetAssignment>>,
    kills: HashMap<GameId, Vec<KillRecord>>,
    pings: HashMap<GameId, HashMap<WalletAddress, Vec<LocationPing>>>,
    heartbeats: HashMap<GameId, Vec<HeartbeatScan>>,
    outbox: HashMap<GameId, Vec<OperatorTx>>,
    cursor: BlockNumber,
}

/// Map-backed store implementing every store port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn corrupt(what: &str) -> crate::error::AppError {
    InfraError::CorruptData(what.to_owned()).into()
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl GameStore for MemoryStore {
    async fn insert_game(&self, game: &Game) -> Result<()> {
        self.inner.write().games.insert(game.id, game.clone());
        Ok(())
    }

    async fn game(&self, game_id: GameId) -> Result<Option<Game>> {
        Ok(self.inner.read().games.get(&game_id).cloned())
    }

    async fn games_in_phase(&self, phase: GamePhase) -> Result<Vec<Game>> {
        let inner = self.inner.read();
        let mut games: Vec<Game> = inner
            .games
            .values()
            .filter(|g| g.phase == phase)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.id);
        Ok(games)
    }

    async fn set_active(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write();
        let game = inner.games.get_mut(&game_id).ok_or_else(|| corrupt("game"))?;
        game.phase = GamePhase::Active;
        game.sub_phase = Some(SubPhase::Checkin);
        game.started_at = Some(at);
        game.sub_phase_started_at = Some(at);
        Ok(())
    }

    async fn set_sub_phase(
        &self,
        game_id: GameId,
        sub_phase: SubPhase,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let game = inner.games.get_mut(&game_id).ok_or_else(|| corrupt("game"))?;
        game.sub_phase = Some(sub_phase);
        game.sub_phase_started_at = Some(at);
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
        let mut inner = self.inner.write();
        let game = inner.games.get_mut(&game_id).ok_or_else(|| corrupt("game"))?;
        game.phase = GamePhase::Ended;
        game.sub_phase = None;
        game.ended_at = Some(at);
        game.winner1 = winner1;
        game.winner2 = winner2;
        game.winner3 = winner3;
        game.top_killer = top_killer;
        Ok(())
    }

    async fn set_cancelled(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write();
        let game = inner.games.get_mut(&game_id).ok_or_else(|| corrupt("game"))?;
        game.phase = GamePhase::Cancelled;
        game.sub_phase = None;
        game.ended_at = Some(at);
        Ok(())
    }

    async fn update_counters(
        &self,
        game_id: GameId,
        player_count: u32,
        total_collected: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let game = inner.games.get_mut(&game_id).ok_or_else(|| corrupt("game"))?;
        game.player_count = player_count;
        game.total_collected = total_collected.to_owned();
        Ok(())
    }

    async fn insert_zone_shrinks(&self, game_id: GameId, shrinks: &[ZoneShrink]) -> Result<()> {
        self.inner.write().shrinks.insert(game_id, shrinks.to_vec());
        Ok(())
    }

    async fn zone_shrinks(&self, game_id: GameId) -> Result<Vec<ZoneShrink>> {
        let mut shrinks = self
            .inner
            .read()
            .shrinks
            .get(&game_id)
            .cloned()
            .unwrap_or_default();
        shrinks.sort_by_key(|s| s.at_second);
        Ok(shrinks)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER STORE
// ═══════════════════════════════════════════════════════════════════════════════

impl MemoryStore {
    fn with_player<R>(
        &self,
        game_id: GameId,
        address: WalletAddress,
        f: impl FnOnce(&mut Player) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.write();
        let players = inner
            .players
            .get_mut(&game_id)
            .ok_or_else(|| corrupt("players"))?;
        let player = players
            .values_mut()
            .find(|p| p.address == address)
            .ok_or_else(|| corrupt("player"))?;
        Ok(f(player))
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn insert_player(&self, player: &Player) -> Result<()> {
        self.inner
            .write()
            .players
            .entry(player.game_id)
            .or_default()
            .insert(player.number, player.clone());
        Ok(())
    }

    async fn player(&self, game_id: GameId, address: WalletAddress) -> Result<Option<Player>> {
        Ok(self.inner.read().players.get(&game_id).and_then(|players| {
            players.values().find(|p| p.address == address).cloned()
        }))
    }

    async fn player_by_number(
        &self,
        game_id: GameId,
        number: PlayerNumber,
    ) -> Result<Option<Player>> {
        Ok(self
            .inner
            .read()
            .players
            .get(&game_id)
            .and_then(|players| players.get(&number).cloned()))
    }

    async fn players(&self, game_id: GameId) -> Result<Vec<Player>> {
        Ok(self
            .inner
            .read()
            .players
            .get(&game_id)
            .map(|players| players.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn alive_players(&self, game_id: GameId) -> Result<Vec<Player>> {
        Ok(self
            .inner
            .read()
            .players
            .get(&game_id)
            .map(|players| players.values().filter(|p| p.is_alive).cloned().collect())
            .unwrap_or_default())
    }

    async fn alive_count(&self, game_id: GameId) -> Result<u32> {
        let count = self
            .inner
            .read()
            .players
            .get(&game_id)
            .map_or(0, |players| players.values().filter(|p| p.is_alive).count());
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn mark_checked_in(&self, game_id: GameId, address: WalletAddress) -> Result<()> {
        self.with_player(game_id, address, |p| p.checked_in = true)
    }

    async fn set_bluetooth_token(
        &self,
        game_id: GameId,
        address: WalletAddress,
        token: &str,
    ) -> Result<()> {
        self.with_player(game_id, address, |p| {
            p.bluetooth_token = Some(token.to_owned());
        })
    }

    async fn eliminate_player(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
        eliminated_by: &str,
    ) -> Result<()> {
        self.with_player(game_id, address, |p| {
            p.is_alive = false;
            p.eliminated_at = Some(at);
            p.eliminated_by = Some(eliminated_by.to_owned());
        })
    }

    async fn increment_kills(&self, game_id: GameId, address: WalletAddress) -> Result<u32> {
        self.with_player(game_id, address, |p| {
            p.kills += 1;
            p.kills
        })
    }

    async fn set_last_heartbeat(
        &self,
        game_id: GameId,
        address: WalletAddress,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_player(game_id, address, |p| p.last_heartbeat_at = Some(at))
    }

    async fn init_heartbeats(&self, game_id: GameId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(players) = inner.players.get_mut(&game_id) {
            for player in players.values_mut().filter(|p| p.is_alive) {
                player.last_heartbeat_at = Some(at);
            }
        }
        Ok(())
    }

    async fn set_has_claimed(&self, game_id: GameId, address: WalletAddress) -> Result<()> {
        self.with_player(game_id, address, |p| p.has_claimed = true)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSIGNMENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn replace_assignments(
        &self,
        game_id: GameId,
        assignments: &[TargetAssignment],
    ) -> Result<()> {
        let map = assignments.iter().map(|a| (a.hunter, *a)).collect();
        self.inner.write().assignments.insert(game_id, map);
        Ok(())
    }

    async fn assignments(&self, game_id: GameId) -> Result<Vec<TargetAssignment>> {
        let mut rows: Vec<TargetAssignment> = self
            .inner
            .read()
            .assignments
            .get(&game_id)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default();
        rows.sort_by_key(|a| a.hunter);
        Ok(rows)
    }

    async fn upsert_assignment(&self, assignment: &TargetAssignment) -> Result<()> {
        self.inner
            .write()
            .assignments
            .entry(assignment.game_id)
            .or_default()
            .insert(assignment.hunter, *assignment);
        Ok(())
    }

    async fn delete_assignment(&self, game_id: GameId, hunter: WalletAddress) -> Result<()> {
        if let Some(map) = self.inner.write().assignments.get_mut(&game_id) {
            map.remove(&hunter);
        }
        Ok(())
    }

    async fn clear_assignments(&self, game_id: GameId) -> Result<()> {
        self.inner.write().assignments.remove(&game_id);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KILL / LOCATION / HEARTBEAT / OUTBOX / CURSOR
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl KillStore for MemoryStore {
    async fn insert_kill(&self, kill: &KillRecord) -> Result<()> {
        self.inner
            .write()
            .kills
            .entry(kill.game_id)
            .or_default()
            .push(kill.clone());
        Ok(())
    }

    async fn kills(&self, game_id: GameId) -> Result<Vec<KillRecord>> {
        Ok(self
            .inner
            .read()
            .kills
            .get(&game_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_kill_tx_hash(&self, kill_id: Uuid, tx_hash: &str) -> Result<()> {
        let mut inner = self.inner.write();
        for kills in inner.kills.values_mut() {
            if let Some(kill) = kills.iter_mut().find(|k| k.id == kill_id) {
                kill.tx_hash = Some(tx_hash.to_owned());
                return Ok(());
            }
        }
        Err(corrupt("kill row"))
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn record_ping(&self, ping: &LocationPing) -> Result<()> {
        self.inner
            .write()
            .pings
            .entry(ping.game_id)
            .or_default()
            .entry(ping.address)
            .or_default()
            .push(ping.clone());
        Ok(())
    }

    async fn latest_ping(
        &self,
        game_id: GameId,
        address: WalletAddress,
    ) -> Result<Option<LocationPing>> {
        Ok(self
            .inner
            .read()
            .pings
            .get(&game_id)
            .and_then(|by_addr| by_addr.get(&address))
            .and_then(|history| {
                history
                    .iter()
                    .max_by_key(|p| p.recorded_at)
                    .cloned()
            }))
    }

    async fn latest_pings(&self, game_id: GameId) -> Result<Vec<LocationPing>> {
        let inner = self.inner.read();
        let mut latest: Vec<LocationPing> = inner
            .pings
            .get(&game_id)
            .map(|by_addr| {
                by_addr
                    .values()
                    .filter_map(|history| history.iter().max_by_key(|p| p.recorded_at).cloned())
                    .collect()
            })
            .unwrap_or_default();
        latest.sort_by_key(|p| p.address);
        Ok(latest)
    }

    async fn prune_pings_before(&self, game_id: GameId, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut dropped = 0_u64;
        let mut inner = self.inner.write();
        if let Some(by_addr) = inner.pings.get_mut(&game_id) {
            for history in by_addr.values_mut() {
                let latest_at = history.iter().map(|p| p.recorded_at).max();
                let before = history.len();
                // Keep each player's latest ping even when stale; recovery
                // reseeds the zone tracker from it.
                history.retain(|p| p.recorded_at >= cutoff || Some(p.recorded_at) == latest_at);
                dropped += u64::try_from(before - history.len()).unwrap_or(0);
            }
        }
        Ok(dropped)
    }
}

#[async_trait]
impl HeartbeatStore for MemoryStore {
    async fn insert_heartbeat_scan(&self, scan: &HeartbeatScan) -> Result<()> {
        self.inner
            .write()
            .heartbeats
            .entry(scan.game_id)
            .or_default()
            .push(scan.clone());
        Ok(())
    }

    async fn heartbeat_scans(&self, game_id: GameId) -> Result<Vec<HeartbeatScan>> {
        Ok(self
            .inner
            .read()
            .heartbeats
            .get(&game_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn insert_operator_tx(&self, tx: &OperatorTx) -> Result<()> {
        self.inner
            .write()
            .outbox
            .entry(tx.game_id)
            .or_default()
            .push(tx.clone());
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
        let mut inner = self.inner.write();
        for txs in inner.outbox.values_mut() {
            if let Some(tx) = txs.iter_mut().find(|t| t.id == id) {
                tx.status = status;
                tx.tx_hash = tx_hash.map(str::to_owned);
                tx.error = error.map(str::to_owned);
                tx.updated_at = at;
                return Ok(());
            }
        }
        Err(corrupt("outbox row"))
    }

    async fn operator_txs(&self, game_id: GameId) -> Result<Vec<OperatorTx>> {
        Ok(self
            .inner
            .read()
            .outbox
            .get(&game_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn sync_cursor(&self) -> Result<BlockNumber> {
        Ok(self.inner.read().cursor)
    }

    async fn set_sync_cursor(&self, block: BlockNumber) -> Result<()> {
        self.inner.write().cursor = block;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlement_client::PrizeSplit;

    use super::*;
    use crate::types::enums::GamePhase;

    fn game(id: u64) -> Game {
        Game {
            id: GameId::new(id),
            title: "t".into(),
            entry_fee: "0".into(),
            min_players: 2,
            max_players: 10,
            registration_deadline: Utc::now(),
            game_date: Utc::now(),
            expiry_deadline: Utc::now(),
            max_duration_seconds: 3600,
            zone_center_lat: 0,
            zone_center_lng: 0,
            meeting_lat: None,
            meeting_lng: None,
            prize_split: PrizeSplit::default(),
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

    fn player(game_id: u64, number: u16) -> Player {
        Player {
            game_id: GameId::new(game_id),
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
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn players_are_ordered_by_number() {
        let store = MemoryStore::new();
        store.insert_game(&game(1)).await.unwrap();
        for n in [3, 1, 2] {
            store.insert_player(&player(1, n)).await.unwrap();
        }
        let players = store.players(GameId::new(1)).await.unwrap();
        let numbers: Vec<u16> = players.iter().map(|p| p.number.get()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn elimination_is_reflected_in_alive_queries() {
        let store = MemoryStore::new();
        store.insert_game(&game(1)).await.unwrap();
        store.insert_player(&player(1, 1)).await.unwrap();
        store.insert_player(&player(1, 2)).await.unwrap();

        let addr = player(1, 2).address;
        store
            .eliminate_player(GameId::new(1), addr, Utc::now(), "zone_violation")
            .await
            .unwrap();

        assert_eq!(store.alive_count(GameId::new(1)).await.unwrap(), 1);
        let p2 = store.player(GameId::new(1), addr).await.unwrap().unwrap();
        assert!(!p2.is_alive);
        assert!(p2.eliminated_at.is_some());
        assert_eq!(p2.eliminated_by.as_deref(), Some("zone_violation"));
    }

    #[tokio::test]
    async fn latest_ping_wins() {
        let store = MemoryStore::new();
        let addr = WalletAddress::new([1; 20]);
        let base = Utc::now();
        for (i, lat) in [(0_i64, 1.0_f64), (10, 2.0), (5, 3.0)] {
            store
                .record_ping(&LocationPing {
                    game_id: GameId::new(1),
                    address: addr,
                    lat,
                    lng: 0.0,
                    recorded_at: base + chrono::Duration::seconds(i),
                    in_zone: true,
                })
                .await
                .unwrap();
        }
        let latest = store
            .latest_ping(GameId::new(1), addr)
            .await
            .unwrap()
            .unwrap();
        assert!((latest.lat - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn prune_keeps_latest_even_if_stale() {
        let store = MemoryStore::new();
        let addr = WalletAddress::new([1; 20]);
        let base = Utc::now();
        for i in 0..3_i64 {
            store
                .record_ping(&LocationPing {
                    game_id: GameId::new(1),
                    address: addr,
                    lat: 0.0,
                    lng: 0.0,
                    recorded_at: base + chrono::Duration::seconds(i),
                    in_zone: true,
                })
                .await
                .unwrap();
        }
        let dropped = store
            .prune_pings_before(GameId::new(1), base + chrono::Duration::seconds(100))
            .await
            .unwrap();
        assert_eq!(dropped, 2);
        assert!(
            store
                .latest_ping(GameId::new(1), addr)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn cursor_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.sync_cursor().await.unwrap().get(), 0);
        store.set_sync_cursor(BlockNumber::new(42)).await.unwrap();
        assert_eq!(store.sync_cursor().await.unwrap().get(), 42);
    }
}
