//! Per-game lifecycle coordination.
//!
//! The [`Coordinator`] owns everything that happens to a game after its
//! creation event: registration deadlines, the check-in ritual, the
//! pregame countdown, the 1 Hz hunt tick, eliminations, and the final
//! settlement. It is constructor-injected with its collaborators (store,
//! fan-out, settlement reader/operator, clock) and keeps all per-game
//! runtime state in registries keyed by game id; there is no module-level
//! mutable state.
//!
//! # Ordering guarantees (per game)
//!
//! - A store mutation always precedes the broadcast announcing it.
//! - The elimination flow is: player mutation → chain-map update →
//!   zone-tracker clear → outbox submission → broadcast → reassignment
//!   notifications → leaderboard broadcast → end-check.
//! - Batch eliminations (zone expiry, heartbeat timeout, failed check-in)
//!   process in player-number order.
//!
//! Each game's runtime state sits behind one async mutex, making every
//! mutation single-writer per game. Operator submissions never block the
//! request that triggered them: they are spawned, and a background
//! completion resolves the outbox row.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use settlement_client::{ChainEvent, OnchainPhase, SettlementOperator, SettlementReader};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::leaderboard::{self, Winners};
use super::target_chain::{ChainError, KillOutcome, RemovalOutcome, TargetChain};
use super::timers::TimerRegistry;
use super::verifier::{self, GameSnapshot, KillVerdict};
use super::zone::ZoneTracker;
use crate::config::GameSettings;
use crate::error::{AppError, DomainError, InfraError, Result, VerifyError};
use crate::geo;
use crate::ports::clock::Clock;
use crate::ports::store::Store;
use crate::qr;
use crate::realtime::Rooms;
use crate::types::entities::{Game, HeartbeatScan, KillRecord, LocationPing, OperatorTx, Player};
use crate::types::enums::{
    EliminationReason, GamePhase, OperatorAction, SubPhase, TxStatus,
};
use crate::types::messages::{
    HuntLink, LeaderboardEntry, ServerMessage, SpectatorPlayer, TargetInfo, ZoneState,
};
use crate::ble;
use crate::types::primitives::{GameId, PlayerNumber, WalletAddress};

/// Players must check in within this radius of the meeting point.
const CHECKIN_RADIUS_METERS: f64 = 5000.0;

/// Check-in monitor cadence.
const CHECKIN_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Auto-seed cadence.
const AUTO_SEED_INTERVAL: Duration = Duration::from_secs(60);

/// Hunt tick cadence.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Spectator frames go out every N ticks.
const SPECTATOR_FRAME_TICKS: u64 = 2;

/// Ping pruning runs every N ticks.
const PING_PRUNE_TICKS: u64 = 60;

/// Pings older than this are pruned (each player's latest survives).
const PING_RETENTION_SECONDS: i64 = 300;

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST / RESPONSE SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Client check-in submission.
#[derive(Debug, Clone, Default)]
pub struct CheckinRequest {
    /// Reported latitude, degrees.
    pub lat: f64,
    /// Reported longitude, degrees.
    pub lng: f64,
    /// QR payload of an already-checked-in player (viral scan).
    pub qr_payload: Option<String>,
    /// The submitter's own Bluetooth token.
    pub bluetooth_token: Option<String>,
    /// Bluetooth identifiers the submitter currently sees.
    pub ble_nearby: Vec<String>,
}

/// Status snapshot served by `GET /api/games/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    /// The game id.
    pub game_id: GameId,
    /// Lifecycle phase.
    pub phase: GamePhase,
    /// Sub-phase while active.
    pub sub_phase: Option<SubPhase>,
    /// Registered players.
    pub player_count: u32,
    /// Alive players.
    pub alive_count: u32,
    /// Check-ins required before the hunt starts.
    pub required_checked_in: u32,
    /// Players checked in so far.
    pub checked_in_count: u32,
    /// Current leaderboard.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Current zone state while the hunt runs.
    pub zone: Option<ZoneState>,
    /// Pregame countdown end (unix seconds), while in pregame.
    pub pregame_ends_at: Option<i64>,
    /// Final winners as player numbers (0 = unfunded slot).
    pub winners: Option<StatusWinners>,
}

/// Winner numbers in a status snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusWinners {
    /// First place.
    pub winner1: u16,
    /// Second place.
    pub winner2: u16,
    /// Third place.
    pub winner3: u16,
    /// Top killer.
    pub top_killer: u16,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory state of one active game.
#[derive(Debug, Default)]
struct GameRuntime {
    chain: TargetChain,
    zone: Option<ZoneTracker>,
    tick_count: u64,
    ending: bool,
    cancellation_in_flight: bool,
    expiry_in_flight: bool,
}

/// One operator call to submit through the outbox.
#[derive(Debug, Clone, Copy)]
enum OperatorRequest {
    StartGame,
    RecordKill {
        hunter: u16,
        target: u16,
        kill_id: Uuid,
    },
    EliminatePlayer {
        number: u16,
        reason: u8,
    },
    EndGame {
        winner1: u16,
        winner2: u16,
        winner3: u16,
        top_killer: u16,
    },
    TriggerCancellation,
    TriggerExpiry,
}

impl OperatorRequest {
    const fn action(self) -> OperatorAction {
        match self {
            Self::StartGame => OperatorAction::StartGame,
            Self::RecordKill { .. } => OperatorAction::RecordKill,
            Self::EliminatePlayer { .. } => OperatorAction::EliminatePlayer,
            Self::EndGame { .. } => OperatorAction::EndGame,
            Self::TriggerCancellation => OperatorAction::TriggerCancellation,
            Self::TriggerExpiry => OperatorAction::TriggerExpiry,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COORDINATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// The per-game lifecycle coordinator.
pub struct Coordinator {
    store: Arc<dyn Store>,
    rooms: Arc<Rooms>,
    reader: Arc<dyn SettlementReader>,
    operator: Arc<dyn SettlementOperator>,
    clock: Arc<dyn Clock>,
    rules: GameSettings,
    runtimes: DashMap<GameId, Arc<Mutex<GameRuntime>>>,
    timers: TimerRegistry,
    /// Serializes operator submissions per game so a kill record can
    /// never land after the end-game call that follows it.
    outbox_locks: DashMap<GameId, Arc<Mutex<()>>>,
    /// Games coordinated without a settlement contract (demo/local play).
    simulated: DashSet<GameId>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("games", &self.runtimes.len())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build a coordinator over its injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        rooms: Arc<Rooms>,
        reader: Arc<dyn SettlementReader>,
        operator: Arc<dyn SettlementOperator>,
        clock: Arc<dyn Clock>,
        rules: GameSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            rooms,
            reader,
            operator,
            clock,
            rules,
            runtimes: DashMap::new(),
            timers: TimerRegistry::new(),
            outbox_locks: DashMap::new(),
            simulated: DashSet::new(),
        })
    }

    /// Mark a game as purely simulated: lifecycle transitions apply
    /// off-chain instead of through operator transactions.
    pub fn register_simulated(&self, game_id: GameId) {
        self.simulated.insert(game_id);
    }

    /// Stop every timer and loop (shutdown path).
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    fn runtime(&self, game_id: GameId) -> Arc<Mutex<GameRuntime>> {
        self.runtimes
            .entry(game_id)
            .or_insert_with(|| Arc::new(Mutex::new(GameRuntime::default())))
            .clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn require_game(&self, game_id: GameId) -> Result<Game> {
        self.store
            .game(game_id)
            .await?
            .ok_or_else(|| DomainError::GameNotFound(game_id).into())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RECOVERY
    // ═══════════════════════════════════════════════════════════════════════

    /// Rebuild runtime state for every non-terminal game after restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read; individual games that
    /// fail to recover are logged and skipped.
    #[instrument(skip(self))]
    pub async fn recover(self: &Arc<Self>) -> Result<()> {
        for game in self.store.games_in_phase(GamePhase::Registration).await? {
            info!(game_id = %game.id, "Recovered game in registration");
            self.schedule_registration_timers(&game);
        }

        for game in self.store.games_in_phase(GamePhase::Active).await? {
            match game.sub_phase {
                Some(SubPhase::Checkin) | None => {
                    info!(game_id = %game.id, "Recovered game in check-in");
                    self.start_checkin_tasks(game.id);
                }
                Some(SubPhase::Pregame) => {
                    let started = game.sub_phase_started_at.unwrap_or_else(|| self.now());
                    let ends = started
                        + ChronoDuration::seconds(
                            i64::try_from(self.rules.pregame_duration_seconds).unwrap_or(0),
                        );
                    let remaining = (ends - self.now()).num_seconds().max(0);
                    info!(game_id = %game.id, remaining, "Recovered game in pregame");
                    self.schedule_pregame_timer(game.id, u64::try_from(remaining).unwrap_or(0));
                }
                Some(SubPhase::Game) => {
                    info!(game_id = %game.id, "Recovered game mid-hunt");
                    if let Err(e) = self.recover_hunt(&game).await {
                        error!(game_id = %game.id, error = %e, "Hunt recovery failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebuild chain map, zone tracker, and the tick loop for a game that
    /// was mid-hunt when the process died.
    async fn recover_hunt(self: &Arc<Self>, game: &Game) -> Result<()> {
        let rt_arc = self.runtime(game.id);
        {
            let mut rt = rt_arc.lock().await;

            let rows = self.store.assignments(game.id).await?;
            rt.chain = TargetChain::from_edges(rows.iter().map(|a| (a.hunter, a.target)));

            let shrinks = self.store.zone_shrinks(game.id).await?;
            let started = game.sub_phase_started_at.unwrap_or_else(|| self.now());
            let mut zone = ZoneTracker::new(
                (game.zone_center_lat, game.zone_center_lng),
                shrinks,
                started,
                self.rules.zone_grace_seconds,
            );
            // Catch the shrink index up before reseeding pings.
            while zone.tick(self.now()).is_some() {}

            // Grace countdowns continue across the restart: each alive
            // player's latest ping replays at its original timestamp.
            for player in self.store.alive_players(game.id).await? {
                if let Some(ping) = self.store.latest_ping(game.id, player.address).await? {
                    zone.process_location(player.address, ping.lat, ping.lng, ping.recorded_at);
                }
            }
            rt.zone = Some(zone);
        }
        self.start_game_tick(game.id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CHAIN EVENTS
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply one settlement event. Called by the chain adapter strictly in
    /// block order.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be applied; the adapter will
    /// not advance the cursor past it.
    #[instrument(skip(self, event), fields(game_id = event.game_id()))]
    pub async fn apply_event(self: &Arc<Self>, event: ChainEvent) -> Result<()> {
        match event {
            ChainEvent::GameCreated { game_id, .. } => {
                self.handle_game_created(GameId::new(game_id)).await
            }
            ChainEvent::PlayerRegistered {
                game_id,
                player,
                player_number,
                total_collected,
            } => {
                self.handle_player_registered(
                    GameId::new(game_id),
                    player.into(),
                    player_number,
                    &total_collected.to_string(),
                )
                .await
            }
            ChainEvent::GameStarted {
                game_id,
                player_count,
            } => {
                self.handle_game_started(GameId::new(game_id), player_count)
                    .await
            }
            ChainEvent::GameEnded {
                game_id,
                winner1,
                winner2,
                winner3,
                top_killer,
            } => {
                self.handle_game_ended(GameId::new(game_id), winner1, winner2, winner3, top_killer)
                    .await
            }
            ChainEvent::GameCancelled { game_id, .. } => {
                self.handle_game_cancelled(GameId::new(game_id)).await
            }
            ChainEvent::PrizeClaimed {
                game_id, player, ..
            }
            | ChainEvent::RefundClaimed {
                game_id, player, ..
            } => {
                self.store
                    .set_has_claimed(GameId::new(game_id), player.into())
                    .await
            }
        }
    }

    async fn handle_game_created(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        if self.store.game(game_id).await?.is_some() {
            info!(%game_id, "Game already known, skipping create");
            return Ok(());
        }

        let onchain = self
            .reader
            .fetch_game(game_id.get())
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;
        let shrinks = self
            .reader
            .fetch_zone_shrinks(game_id.get())
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;

        let setup = onchain.setup;
        let game = Game {
            id: game_id,
            title: setup.title,
            entry_fee: setup.entry_fee.to_string(),
            min_players: setup.min_players,
            max_players: setup.max_players,
            registration_deadline: setup.registration_deadline,
            game_date: setup.game_date,
            expiry_deadline: setup.expiry_deadline,
            max_duration_seconds: setup.max_duration_seconds,
            zone_center_lat: setup.zone_center.0,
            zone_center_lng: setup.zone_center.1,
            meeting_lat: setup.meeting_point.map(|m| m.0),
            meeting_lng: setup.meeting_point.map(|m| m.1),
            prize_split: setup.prize_split,
            player_count: onchain.player_count,
            total_collected: onchain.total_collected.to_string(),
            phase: GamePhase::Registration,
            sub_phase: None,
            started_at: None,
            sub_phase_started_at: None,
            ended_at: None,
            winner1: None,
            winner2: None,
            winner3: None,
            top_killer: None,
        };

        self.store.insert_game(&game).await?;
        let shrink_rows: Vec<_> = shrinks
            .iter()
            .map(|s| crate::types::entities::ZoneShrink {
                game_id,
                at_second: s.at_second,
                radius_meters: s.radius_meters,
            })
            .collect();
        self.store.insert_zone_shrinks(game_id, &shrink_rows).await?;

        info!(%game_id, title = %game.title, "Game created");
        self.schedule_registration_timers(&game);
        Ok(())
    }

    async fn handle_player_registered(
        self: &Arc<Self>,
        game_id: GameId,
        address: WalletAddress,
        number: u16,
        total_collected: &str,
    ) -> Result<()> {
        let _ = self.require_game(game_id).await?;
        if self.store.player(game_id, address).await?.is_some() {
            info!(%game_id, %address, "Player already registered, skipping");
            return Ok(());
        }

        let number = PlayerNumber::new(number).map_err(|e| {
            AppError::from(InfraError::ChainEventProcessingFailed(e.to_string()))
        })?;
        let player = Player {
            game_id,
            address,
            number,
            is_alive: true,
            kills: 0,
            eliminated_at: None,
            eliminated_by: None,
            checked_in: false,
            bluetooth_token: None,
            last_heartbeat_at: None,
            has_claimed: false,
            registered_at: self.now(),
        };
        self.store.insert_player(&player).await?;

        let player_count = u32::try_from(self.store.players(game_id).await?.len()).unwrap_or(0);
        self.store
            .update_counters(game_id, player_count, total_collected)
            .await?;

        info!(%game_id, %address, number = number.get(), "Player registered");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::PlayerRegistered {
                player_number: number,
                player_count,
            },
        );
        Ok(())
    }

    async fn handle_game_started(self: &Arc<Self>, game_id: GameId, player_count: u32) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Registration {
            info!(%game_id, "Game already started, skipping");
            return Ok(());
        }

        let now = self.now();
        self.store.set_active(game_id, now).await?;

        let checkin_ends_at = now
            + ChronoDuration::seconds(
                i64::try_from(self.rules.checkin_duration_seconds).unwrap_or(0),
            );
        info!(%game_id, player_count, "Check-in opened");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::GameCheckinStarted {
                checkin_duration_seconds: self.rules.checkin_duration_seconds,
                checkin_ends_at: checkin_ends_at.timestamp(),
                required_checked_in: game.required_checked_in(),
            },
        );

        self.start_checkin_tasks(game_id);
        Ok(())
    }

    async fn handle_game_ended(
        self: &Arc<Self>,
        game_id: GameId,
        winner1: u16,
        winner2: u16,
        winner3: u16,
        top_killer: u16,
    ) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase == GamePhase::Ended {
            return Ok(());
        }

        let players = self.store.players(game_id).await?;
        self.store
            .set_ended(
                game_id,
                self.now(),
                leaderboard::address_of_number(&players, winner1),
                leaderboard::address_of_number(&players, winner2),
                leaderboard::address_of_number(&players, winner3),
                leaderboard::address_of_number(&players, top_killer),
            )
            .await?;
        self.store.clear_assignments(game_id).await?;

        info!(%game_id, winner1, "Game ended (chain event)");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::GameEnded {
                winner1,
                winner2,
                winner3,
                top_killer,
            },
        );
        self.cleanup_game(game_id);
        Ok(())
    }

    async fn handle_game_cancelled(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase == GamePhase::Cancelled {
            return Ok(());
        }

        self.store.set_cancelled(game_id, self.now()).await?;
        info!(%game_id, "Game cancelled");
        self.rooms
            .broadcast(game_id, &ServerMessage::GameCancelled { game_id });
        self.cleanup_game(game_id);
        Ok(())
    }

    fn cleanup_game(&self, game_id: GameId) {
        self.timers.cancel(game_id);
        self.runtimes.remove(&game_id);
        self.rooms.close_game(game_id);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REGISTRATION DEADLINES / AUTO-START
    // ═══════════════════════════════════════════════════════════════════════

    fn schedule_registration_timers(self: &Arc<Self>, game: &Game) {
        let token = self.timers.token(game.id);
        for deadline in [game.registration_deadline, game.game_date] {
            let delay = (deadline - self.now()).num_seconds().max(0);
            let delay = Duration::from_secs(u64::try_from(delay).unwrap_or(0) + 1);
            let this = Arc::clone(self);
            let game_id = game.id;
            let token = token.clone();
            self.timers.register(
                game.id,
                tokio::spawn(async move {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = sleep(delay) => {
                            if let Err(e) = this.check_game_schedule(game_id).await {
                                warn!(%game_id, error = %e, "Schedule check failed");
                            }
                        }
                    }
                }),
            );
        }
    }

    /// Run deadline and game-date checks over every game still in
    /// registration (also exposed via the admin endpoint).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn check_auto_start(self: &Arc<Self>) -> Result<()> {
        for game in self.store.games_in_phase(GamePhase::Registration).await? {
            if let Err(e) = self.check_game_schedule(game.id).await {
                warn!(game_id = %game.id, error = %e, "Schedule check failed");
            }
        }
        Ok(())
    }

    /// Evaluate one game's registration deadline and game date against
    /// chain time.
    ///
    /// # Errors
    ///
    /// Returns an error if chain time or the store is unavailable.
    pub async fn check_game_schedule(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Registration {
            return Ok(());
        }

        let chain_now = self
            .reader
            .chain_time()
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;

        if chain_now >= game.game_date {
            if game.player_count >= game.min_players {
                info!(%game_id, "Game date reached, starting");
                if self.simulated.contains(&game_id) {
                    self.handle_game_started(game_id, game.player_count).await?;
                } else {
                    self.spawn_operator(game_id, OperatorRequest::StartGame);
                }
            } else {
                info!(%game_id, "Game date reached under-subscribed, cancelling");
                self.cancel_suppressing_duplicates(game_id).await?;
            }
        } else if chain_now >= game.registration_deadline && game.player_count < game.min_players {
            info!(%game_id, "Registration deadline reached under-subscribed, cancelling");
            self.cancel_suppressing_duplicates(game_id).await?;
        }
        Ok(())
    }

    /// The deadline timer, the game-date timer, and the admin sweep can
    /// all observe under-subscription; only the first submission wins.
    async fn cancel_suppressing_duplicates(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        match self.trigger_cancellation(game_id).await {
            Ok(())
            | Err(AppError::Domain(DomainError::DuplicateCancellationSuppressed(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CANCELLATION / EXPIRY
    // ═══════════════════════════════════════════════════════════════════════

    /// Trigger cancellation for an under-subscribed game.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DuplicateCancellationSuppressed`] when a
    /// submission is already in flight.
    pub async fn trigger_cancellation(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        {
            let rt_arc = self.runtime(game_id);
            let mut rt = rt_arc.lock().await;
            if rt.cancellation_in_flight {
                info!(%game_id, "Duplicate cancellation suppressed");
                return Err(DomainError::DuplicateCancellationSuppressed(game_id).into());
            }
            rt.cancellation_in_flight = true;
        }

        if self.simulated.contains(&game_id) {
            return self.handle_game_cancelled(game_id).await;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // The deadline timer and the admin sweep can race; the chain
            // phase is re-read just before submission.
            match this.reader.fetch_game(game_id.get()).await {
                Ok(onchain) if onchain.phase != OnchainPhase::Registration => {
                    info!(%game_id, "Duplicate cancellation suppressed (already cancelled on chain)");
                }
                Ok(_) => {
                    let _ = this
                        .submit_operator(game_id, OperatorRequest::TriggerCancellation)
                        .await;
                }
                Err(e) => {
                    error!(%game_id, error = %e, "Phase re-read before cancellation failed");
                }
            }
        });
        Ok(())
    }

    /// Trigger expiry for a game whose check-in never completed.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DuplicateExpirySuppressed`] when a
    /// submission is already in flight.
    pub async fn trigger_expiry(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        {
            let rt_arc = self.runtime(game_id);
            let mut rt = rt_arc.lock().await;
            if rt.expiry_in_flight {
                info!(%game_id, "Duplicate expiry suppressed");
                return Err(DomainError::DuplicateExpirySuppressed(game_id).into());
            }
            rt.expiry_in_flight = true;
        }

        if self.simulated.contains(&game_id) {
            return self.handle_game_cancelled(game_id).await;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.reader.fetch_game(game_id.get()).await {
                Ok(onchain) if onchain.phase != OnchainPhase::Active => {
                    info!(%game_id, "Duplicate expiry suppressed (chain phase moved on)");
                }
                Ok(_) => {
                    let _ = this
                        .submit_operator(game_id, OperatorRequest::TriggerExpiry)
                        .await;
                }
                Err(e) => {
                    error!(%game_id, error = %e, "Phase re-read before expiry failed");
                }
            }
        });
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CHECK-IN
    // ═══════════════════════════════════════════════════════════════════════

    fn start_checkin_tasks(self: &Arc<Self>, game_id: GameId) {
        let token = self.timers.token(game_id);

        // Monitor: completion + expiry every 2 s.
        let this = Arc::clone(self);
        let monitor_token = token.clone();
        self.timers.register(
            game_id,
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = monitor_token.cancelled() => break,
                        () = sleep(CHECKIN_MONITOR_INTERVAL) => {
                            match this.run_checkin_monitor_once(game_id).await {
                                Ok(true) => {}
                                Ok(false) => break,
                                Err(e) => warn!(%game_id, error = %e, "Check-in monitor failed"),
                            }
                        }
                    }
                }
            }),
        );

        // Auto-seed: first links of the viral chain, immediately then
        // every 60 s.
        let this = Arc::clone(self);
        self.timers.register(
            game_id,
            tokio::spawn(async move {
                loop {
                    match this.run_auto_seed_once(game_id).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => warn!(%game_id, error = %e, "Auto-seed failed"),
                    }
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = sleep(AUTO_SEED_INTERVAL) => {}
                    }
                }
            }),
        );
    }

    /// One check-in monitor pass. Returns `false` once check-in is over.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or chain time is unavailable.
    pub async fn run_checkin_monitor_once(self: &Arc<Self>, game_id: GameId) -> Result<bool> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Checkin) {
            return Ok(false);
        }

        let chain_now = self
            .reader
            .chain_time()
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;
        if chain_now > game.expiry_deadline {
            info!(%game_id, "Check-in expiry deadline passed");
            match self.trigger_expiry(game_id).await {
                Ok(()) | Err(AppError::Domain(DomainError::DuplicateExpirySuppressed(_))) => {}
                Err(e) => return Err(e),
            }
            return Ok(true);
        }

        let players = self.store.players(game_id).await?;
        let checked = checked_in_count(&players);
        if checked >= game.required_checked_in() {
            self.complete_checkin(&game).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// One auto-seed pass. Returns `false` once check-in is over.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn run_auto_seed_once(self: &Arc<Self>, game_id: GameId) -> Result<bool> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Checkin) {
            return Ok(false);
        }

        let players = self.store.players(game_id).await?;
        let alive: Vec<&Player> = players.iter().filter(|p| p.is_alive).collect();
        let seed_target = seed_target(u32::try_from(alive.len()).unwrap_or(0));
        let mut checked = checked_in_count(&players);
        if checked >= seed_target {
            return Ok(true);
        }

        let (meeting_lat, meeting_lng) = game.meeting_point();
        let meeting = (
            geo::micro_to_degrees(meeting_lat),
            geo::micro_to_degrees(meeting_lng),
        );

        // Alive, not yet checked in, recently pinged near the meeting
        // point, closest first.
        let mut candidates: Vec<(f64, &Player)> = Vec::new();
        for player in alive.iter().filter(|p| !p.checked_in) {
            if let Some(ping) = self.store.latest_ping(game_id, player.address).await? {
                let distance =
                    geo::haversine_meters(meeting.0, meeting.1, ping.lat, ping.lng);
                if distance <= CHECKIN_RADIUS_METERS {
                    candidates.push((distance, *player));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.number.cmp(&b.1.number)));

        let total_players = u32::try_from(players.len()).unwrap_or(0);
        for (_, player) in candidates {
            if checked >= seed_target {
                break;
            }
            self.store.mark_checked_in(game_id, player.address).await?;
            checked += 1;
            info!(%game_id, player = player.number.get(), "Auto-seeded check-in");
            self.rooms.broadcast(
                game_id,
                &ServerMessage::CheckinUpdate {
                    checked_in_count: checked,
                    total_players,
                    player_number: player.number,
                },
            );
        }
        Ok(true)
    }

    /// Client-driven check-in (viral scan).
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] describing the first failed check.
    #[instrument(skip(self, request), fields(%game_id, %caller))]
    pub async fn client_checkin(
        self: &Arc<Self>,
        game_id: GameId,
        caller: WalletAddress,
        request: CheckinRequest,
    ) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Checkin) {
            return Err(VerifyError::CheckinClosed.into());
        }
        let chain_now = self
            .reader
            .chain_time()
            .await
            .map_err(|e| InfraError::ChainEventProcessingFailed(e.to_string()))?;
        if chain_now > game.expiry_deadline {
            return Err(VerifyError::CheckinClosed.into());
        }

        let player = self
            .store
            .player(game_id, caller)
            .await?
            .ok_or(VerifyError::NotRegistered)?;

        let (meeting_lat, meeting_lng) = game.meeting_point();
        let distance = geo::haversine_meters(
            geo::micro_to_degrees(meeting_lat),
            geo::micro_to_degrees(meeting_lng),
            request.lat,
            request.lng,
        );
        if distance > CHECKIN_RADIUS_METERS {
            return Err(VerifyError::TooFarFromMeetingPoint.into());
        }

        // Presence near the meeting point doubles as a location report.
        self.store
            .record_ping(&LocationPing {
                game_id,
                address: caller,
                lat: request.lat,
                lng: request.lng,
                recorded_at: self.now(),
                in_zone: true,
            })
            .await?;

        if player.checked_in {
            // An auto-seeded player who never presented a token may
            // resubmit solely to attach one.
            return match (&player.bluetooth_token, &request.bluetooth_token) {
                (None, Some(token)) => {
                    self.store
                        .set_bluetooth_token(game_id, caller, &ble::canonicalize(token))
                        .await?;
                    Ok(())
                }
                _ => Err(VerifyError::AlreadyCheckedIn.into()),
            };
        }

        // Everyone past the seeds proves presence by scanning someone
        // already checked in.
        let payload = request.qr_payload.as_deref().ok_or(VerifyError::InvalidQr)?;
        let (scanned_game, scanned_number) =
            qr::decode(payload).map_err(|_| VerifyError::InvalidQr)?;
        if scanned_game != game_id {
            return Err(VerifyError::WrongGame.into());
        }
        let scanned = self
            .store
            .player_by_number(game_id, scanned_number)
            .await?
            .ok_or(VerifyError::UnknownPlayer)?;
        if scanned.address == caller {
            return Err(VerifyError::ScanYourself.into());
        }
        if !scanned.checked_in {
            return Err(VerifyError::ScannedNotCheckedIn.into());
        }
        if self.rules.ble_required {
            let token = scanned
                .bluetooth_token
                .as_deref()
                .ok_or(VerifyError::TargetBluetoothMissing)?;
            if !ble::matches_any(token, &request.ble_nearby) {
                return Err(VerifyError::NotSeenOverBluetooth.into());
            }
        }

        self.store.mark_checked_in(game_id, caller).await?;
        if let Some(token) = &request.bluetooth_token {
            self.store
                .set_bluetooth_token(game_id, caller, &ble::canonicalize(token))
                .await?;
        }

        let players = self.store.players(game_id).await?;
        let checked = checked_in_count(&players);
        info!(%game_id, player = player.number.get(), checked, "Player checked in");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::CheckinUpdate {
                checked_in_count: checked,
                total_players: u32::try_from(players.len()).unwrap_or(0),
                player_number: player.number,
            },
        );

        // Completion is the check-in monitor's job: late scans that land
        // within one monitor interval still count.
        Ok(())
    }

    /// Close check-in: cull the unchecked, enter pregame (or end
    /// immediately if at most one player survived the cull).
    async fn complete_checkin(self: &Arc<Self>, game: &Game) -> Result<()> {
        let game_id = game.id;
        let now = self.now();

        let rt_arc = self.runtime(game_id);
        let mut rt = rt_arc.lock().await;

        // Re-read under the lock: a concurrent path may have completed
        // check-in already.
        let current = self.require_game(game_id).await?;
        if current.sub_phase != Some(SubPhase::Checkin) {
            return Ok(());
        }

        let players = self.store.players(game_id).await?;
        let unchecked: Vec<&Player> = players
            .iter()
            .filter(|p| p.is_alive && !p.checked_in)
            .collect();
        for victim in unchecked {
            self.eliminate_forced(game_id, &mut rt, victim, EliminationReason::NoCheckin)
                .await?;
        }

        let alive = self.store.alive_count(game_id).await?;
        if alive <= 1 {
            info!(%game_id, "Check-in left at most one player, ending immediately");
            self.maybe_end(game_id, &mut rt, alive);
            return Ok(());
        }

        self.store
            .set_sub_phase(game_id, SubPhase::Pregame, now)
            .await?;
        let ends_at = now
            + ChronoDuration::seconds(
                i64::try_from(self.rules.pregame_duration_seconds).unwrap_or(0),
            );
        info!(%game_id, alive, "Check-in complete, pregame started");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::GamePregameStarted {
                pregame_duration_seconds: self.rules.pregame_duration_seconds,
                pregame_ends_at: ends_at.timestamp(),
                checked_in_count: alive,
                player_count: u32::try_from(players.len()).unwrap_or(0),
            },
        );
        drop(rt);

        self.schedule_pregame_timer(game_id, self.rules.pregame_duration_seconds);
        Ok(())
    }

    fn schedule_pregame_timer(self: &Arc<Self>, game_id: GameId, delay_seconds: u64) {
        let token = self.timers.token(game_id);
        let this = Arc::clone(self);
        self.timers.register(
            game_id,
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = sleep(Duration::from_secs(delay_seconds)) => {
                        if let Err(e) = this.begin_game(game_id).await {
                            error!(%game_id, error = %e, "Hunt start failed");
                        }
                    }
                }
            }),
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HUNT START
    // ═══════════════════════════════════════════════════════════════════════

    /// Pregame countdown elapsed: build the target chain and start the
    /// hunt.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    #[instrument(skip(self))]
    pub async fn begin_game(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Pregame) {
            return Ok(());
        }

        let now = self.now();
        let rt_arc = self.runtime(game_id);
        let mut rt = rt_arc.lock().await;

        let alive = self.store.alive_players(game_id).await?;
        if alive.len() < 2 {
            self.maybe_end(game_id, &mut rt, u32::try_from(alive.len()).unwrap_or(0));
            return Ok(());
        }

        // Circular target chain over a crypto-shuffled order.
        rt.chain = TargetChain::shuffled(alive.iter().map(|p| p.address).collect());
        let rows: Vec<_> = rt
            .chain
            .edges()
            .into_iter()
            .map(|(hunter, target)| crate::types::entities::TargetAssignment {
                game_id,
                hunter,
                target,
                assigned_at: now,
            })
            .collect();
        self.store.replace_assignments(game_id, &rows).await?;

        let shrinks = self.store.zone_shrinks(game_id).await?;
        let zone = ZoneTracker::new(
            (game.zone_center_lat, game.zone_center_lng),
            shrinks,
            now,
            self.rules.zone_grace_seconds,
        );
        let zone_state = zone.zone_state(now);
        rt.zone = Some(zone);

        self.store.init_heartbeats(game_id, now).await?;
        self.store.set_sub_phase(game_id, SubPhase::Game, now).await?;

        let heartbeat_deadline = (now
            + ChronoDuration::seconds(
                i64::try_from(self.rules.heartbeat_interval_seconds).unwrap_or(0),
            ))
        .timestamp();

        // Every hunter learns their target, their hunter, and the zone.
        for player in &alive {
            let Some(target_addr) = rt.chain.target_of(player.address) else {
                continue;
            };
            let Some(hunter_addr) = rt.chain.hunter_of(player.address) else {
                continue;
            };
            let target_number = number_of(&alive, target_addr);
            let hunter_number = number_of(&alive, hunter_addr);
            if let (Some(target), Some(hunter)) = (target_number, hunter_number) {
                self.rooms.send_to_player(
                    game_id,
                    player.address,
                    &ServerMessage::GameStarted {
                        target: TargetInfo {
                            player_number: target,
                        },
                        hunter_player_number: hunter,
                        heartbeat_deadline,
                        heartbeat_interval_seconds: self.rules.heartbeat_interval_seconds,
                        zone: zone_state,
                    },
                );
            }
        }
        let player_count = u32::try_from(alive.len()).unwrap_or(0);
        info!(%game_id, player_count, "Hunt started");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::GameStartedBroadcast { player_count },
        );
        drop(rt);

        self.start_game_tick(game_id);
        Ok(())
    }

    fn start_game_tick(self: &Arc<Self>, game_id: GameId) {
        let token = self.timers.token(game_id);
        let this = Arc::clone(self);
        self.timers.register(
            game_id,
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = sleep(TICK_INTERVAL) => {
                            match this.run_game_tick_once(game_id).await {
                                Ok(true) => {}
                                Ok(false) => break,
                                Err(e) => warn!(%game_id, error = %e, "Game tick failed"),
                            }
                        }
                    }
                }
            }),
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GAME TICK
    // ═══════════════════════════════════════════════════════════════════════

    /// One 1 Hz tick. Returns `false` once the game is no longer running.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn run_game_tick_once(self: &Arc<Self>, game_id: GameId) -> Result<bool> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Game) {
            return Ok(false);
        }

        let now = self.now();
        let rt_arc = self.runtime(game_id);
        let mut rt = rt_arc.lock().await;
        rt.tick_count += 1;
        let tick = rt.tick_count;

        // 1. Zone shrink.
        if let Some(state) = rt.zone.as_mut().and_then(|z| z.tick(now)) {
            info!(%game_id, radius = state.current_radius_meters, "Zone shrank");
            self.rooms.broadcast(
                game_id,
                &ServerMessage::ZoneShrink {
                    center_lat: state.center_lat,
                    center_lng: state.center_lng,
                    current_radius_meters: state.current_radius_meters,
                    next_shrink_at: state.next_shrink_at,
                    next_radius_meters: state.next_radius_meters,
                },
            );
        }

        let players = self.store.players(game_id).await?;

        // 2. Out-of-zone grace expiries, player-number order.
        let expired = rt
            .zone
            .as_ref()
            .map(|z| z.expired_players(now))
            .unwrap_or_default();
        let mut victims: Vec<&Player> = expired
            .iter()
            .filter_map(|addr| players.iter().find(|p| p.address == *addr && p.is_alive))
            .collect();
        victims.sort_by_key(|p| p.number);
        for victim in victims {
            self.eliminate_forced(game_id, &mut rt, victim, EliminationReason::ZoneViolation)
                .await?;
        }

        // 3. Heartbeat timeouts, player-number order.
        let alive_now = self.store.alive_count(game_id).await?;
        if alive_now > self.rules.heartbeat_disable_threshold {
            let interval =
                ChronoDuration::seconds(i64::try_from(self.rules.heartbeat_interval_seconds).unwrap_or(0));
            let stale: Vec<&Player> = players
                .iter()
                .filter(|p| {
                    p.is_alive
                        && p.last_heartbeat_at
                            .is_some_and(|last| last + interval < now)
                })
                .collect();
            for victim in stale {
                // Earlier zone eliminations this tick may have already
                // dropped the count to the threshold.
                if self.store.alive_count(game_id).await? <= self.rules.heartbeat_disable_threshold
                {
                    break;
                }
                if self
                    .store
                    .player(game_id, victim.address)
                    .await?
                    .is_some_and(|p| p.is_alive)
                {
                    self.eliminate_forced(
                        game_id,
                        &mut rt,
                        victim,
                        EliminationReason::HeartbeatTimeout,
                    )
                    .await?;
                }
            }
        }

        // 4. End condition.
        let alive = self.store.alive_count(game_id).await?;
        if alive <= 1 {
            self.maybe_end(game_id, &mut rt, alive);
            return Ok(false);
        }

        // 5. Spectator frame every 2 s.
        if tick % SPECTATOR_FRAME_TICKS == 0 {
            let frame = self.spectator_frame(game_id, &rt, now).await?;
            self.rooms.broadcast_spectators(game_id, &frame);
        }

        // 6. Ping pruning every 60 s.
        if tick % PING_PRUNE_TICKS == 0 {
            let cutoff = now - ChronoDuration::seconds(PING_RETENTION_SECONDS);
            let dropped = self.store.prune_pings_before(game_id, cutoff).await?;
            if dropped > 0 {
                info!(%game_id, dropped, "Pruned stale location pings");
            }
        }

        Ok(true)
    }

    async fn spectator_frame(
        &self,
        game_id: GameId,
        rt: &GameRuntime,
        now: DateTime<Utc>,
    ) -> Result<ServerMessage> {
        let players = self.store.players(game_id).await?;
        let pings = self.store.latest_pings(game_id).await?;

        let positions: Vec<SpectatorPlayer> = players
            .iter()
            .filter(|p| p.is_alive)
            .filter_map(|p| {
                pings
                    .iter()
                    .find(|ping| ping.address == p.address)
                    .map(|ping| SpectatorPlayer {
                        player_number: p.number,
                        lat: ping.lat,
                        lng: ping.lng,
                        is_alive: p.is_alive,
                        kills: p.kills,
                    })
            })
            .collect();

        let hunt_links: Vec<HuntLink> = rt
            .chain
            .edges()
            .into_iter()
            .filter_map(|(hunter, target)| {
                Some(HuntLink {
                    hunter: number_of(&players, hunter)?,
                    target: number_of(&players, target)?,
                })
            })
            .collect();

        Ok(ServerMessage::SpectatorPositions {
            players: positions,
            zone: rt.zone.as_ref().map(|z| z.zone_state(now)),
            alive_count: u32::try_from(players.iter().filter(|p| p.is_alive).count())
                .unwrap_or(0),
            hunt_links,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CLIENT REQUESTS: LOCATION / KILL / HEARTBEAT
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a location ping; during the hunt this also drives the
    /// out-of-zone grace countdown.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown games or unregistered callers.
    pub async fn record_location(
        self: &Arc<Self>,
        game_id: GameId,
        caller: WalletAddress,
        lat: f64,
        lng: f64,
        client_timestamp: i64,
    ) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active {
            return Err(DomainError::GameNotActive(game_id).into());
        }
        let player = self
            .store
            .player(game_id, caller)
            .await?
            .ok_or(VerifyError::NotRegistered)?;

        let now = self.now();
        // Trust the client timestamp only within a small skew.
        let recorded_at = if (now.timestamp() - client_timestamp).abs() <= 120 {
            DateTime::from_timestamp(client_timestamp, 0).unwrap_or(now)
        } else {
            now
        };

        let mut in_zone = true;
        if game.sub_phase == Some(SubPhase::Game) && player.is_alive {
            let rt_arc = self.runtime(game_id);
            let mut rt = rt_arc.lock().await;
            if let Some(zone) = rt.zone.as_mut() {
                let verdict = zone.process_location(caller, lat, lng, now);
                in_zone = verdict.in_zone;
                if !verdict.in_zone {
                    self.rooms.send_to_player(
                        game_id,
                        caller,
                        &ServerMessage::ZoneWarning {
                            seconds_remaining: verdict.seconds_remaining.unwrap_or(0),
                            in_zone: false,
                        },
                    );
                }
            }
        }

        self.store
            .record_ping(&LocationPing {
                game_id,
                address: caller,
                lat,
                lng,
                recorded_at,
                in_zone,
            })
            .await?;
        Ok(())
    }

    /// Verify and process a kill scan.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when any proof dimension fails.
    #[instrument(skip(self, qr_payload, ble_nearby), fields(%game_id, %caller))]
    pub async fn submit_kill(
        self: &Arc<Self>,
        game_id: GameId,
        caller: WalletAddress,
        qr_payload: &str,
        hunter_lat: f64,
        hunter_lng: f64,
        ble_nearby: Vec<String>,
    ) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Game) {
            return Err(DomainError::GameNotActive(game_id).into());
        }

        let rt_arc = self.runtime(game_id);
        let mut rt = rt_arc.lock().await;

        let snapshot = self.snapshot(game_id, &rt).await?;
        let verdict = match verifier::verify_kill(
            &snapshot,
            &self.rules,
            caller,
            qr_payload,
            hunter_lat,
            hunter_lng,
            &ble_nearby,
        ) {
            Ok(verdict) => verdict,
            Err(err) => {
                info!(%game_id, %caller, code = err.code(), "Kill rejected");
                return Err(err.into());
            }
        };

        self.eliminate_by_kill(game_id, &mut rt, caller, hunter_lat, hunter_lng, verdict)
            .await
    }

    /// Verify and process a heartbeat scan, returning the scanned
    /// player's number.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] when any check fails.
    #[instrument(skip(self, qr_payload, ble_nearby), fields(%game_id, %caller))]
    pub async fn submit_heartbeat(
        self: &Arc<Self>,
        game_id: GameId,
        caller: WalletAddress,
        qr_payload: &str,
        lat: f64,
        lng: f64,
        ble_nearby: Vec<String>,
    ) -> Result<PlayerNumber> {
        let game = self.require_game(game_id).await?;
        if game.phase != GamePhase::Active || game.sub_phase != Some(SubPhase::Game) {
            return Err(DomainError::GameNotActive(game_id).into());
        }

        let rt_arc = self.runtime(game_id);
        let rt = rt_arc.lock().await;

        let snapshot = self.snapshot(game_id, &rt).await?;
        let verdict = match verifier::verify_heartbeat(
            &snapshot,
            &self.rules,
            caller,
            qr_payload,
            lat,
            lng,
            &ble_nearby,
        ) {
            Ok(verdict) => verdict,
            Err(err) => {
                info!(%game_id, %caller, code = err.code(), "Heartbeat rejected");
                return Err(err.into());
            }
        };
        drop(rt);

        let now = self.now();
        let scanned = verdict.scanned;
        // The scanned player's liveness is refreshed, not the scanner's.
        self.store
            .set_last_heartbeat(game_id, scanned.address, now)
            .await?;
        self.store
            .insert_heartbeat_scan(&HeartbeatScan {
                id: Uuid::new_v4(),
                game_id,
                scanner: caller,
                scanned: scanned.address,
                occurred_at: now,
            })
            .await?;

        let refreshed_until = (now
            + ChronoDuration::seconds(
                i64::try_from(self.rules.heartbeat_interval_seconds).unwrap_or(0),
            ))
        .timestamp();
        self.rooms.send_to_player(
            game_id,
            scanned.address,
            &ServerMessage::HeartbeatRefreshed { refreshed_until },
        );
        self.rooms.send_to_player(
            game_id,
            caller,
            &ServerMessage::HeartbeatScanSuccess {
                scanned_player_number: scanned.number,
            },
        );
        Ok(scanned.number)
    }

    async fn snapshot(&self, game_id: GameId, rt: &GameRuntime) -> Result<GameSnapshot> {
        Ok(GameSnapshot::new(
            game_id,
            self.store.players(game_id).await?,
            rt.chain.edges(),
            self.store.latest_pings(game_id).await?,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ELIMINATION FLOW
    // ═══════════════════════════════════════════════════════════════════════

    async fn eliminate_by_kill(
        self: &Arc<Self>,
        game_id: GameId,
        rt: &mut GameRuntime,
        hunter_addr: WalletAddress,
        hunter_lat: f64,
        hunter_lng: f64,
        verdict: KillVerdict,
    ) -> Result<()> {
        let now = self.now();
        let victim = verdict.target.clone();

        // 1. Store mutations: victim dies, hunter scores, audit row.
        self.store
            .eliminate_player(game_id, victim.address, now, &hunter_addr.to_hex())
            .await?;
        let hunter_kills = self.store.increment_kills(game_id, hunter_addr).await?;
        let kill_id = Uuid::new_v4();
        self.store
            .insert_kill(&KillRecord {
                id: kill_id,
                game_id,
                hunter: hunter_addr,
                target: victim.address,
                occurred_at: now,
                hunter_lat,
                hunter_lng,
                target_lat: verdict.target_lat,
                target_lng: verdict.target_lng,
                distance_meters: verdict.distance_meters,
                tx_hash: None,
            })
            .await?;

        // 2. Chain rewiring.
        let rewire = match rt.chain.process_kill(hunter_addr, victim.address) {
            Ok(KillOutcome::Collapsed) => {
                self.store.delete_assignment(game_id, victim.address).await?;
                self.store.delete_assignment(game_id, hunter_addr).await?;
                None
            }
            Ok(KillOutcome::Rewired { new_target }) => {
                self.store.delete_assignment(game_id, victim.address).await?;
                self.store
                    .upsert_assignment(&crate::types::entities::TargetAssignment {
                        game_id,
                        hunter: hunter_addr,
                        target: new_target,
                        assigned_at: now,
                    })
                    .await?;
                Some((hunter_addr, new_target))
            }
            Err(err @ (ChainError::TargetMismatch | ChainError::MissingAssignment(_))) => {
                // The verifier guarantees assignment agreement; reaching
                // this is a consistency violation. No broadcast.
                error!(%game_id, %hunter_addr, error = %err, "Target chain inconsistency on kill");
                return Err(DomainError::ChainInconsistency {
                    game_id,
                    detail: err.to_string(),
                }
                .into());
            }
        };

        let players = self.store.players(game_id).await?;
        let hunter_number = number_of(&players, hunter_addr);

        // 4. Settlement, off the request path.
        if let Some(hunter_number) = hunter_number {
            self.spawn_operator(
                game_id,
                OperatorRequest::RecordKill {
                    hunter: hunter_number.get(),
                    target: victim.number.get(),
                    kill_id,
                },
            );
        }

        // 5. Broadcasts.
        if let Some(hunter_number) = hunter_number {
            self.rooms.broadcast(
                game_id,
                &ServerMessage::KillRecorded {
                    hunter_number,
                    target_number: victim.number,
                    hunter_kills,
                },
            );
        }
        info!(%game_id, hunter = %hunter_addr, target = victim.number.get(), "Kill recorded");

        self.finish_elimination(game_id, rt, &players, &victim, hunter_number, "kill", rewire)
            .await
    }

    async fn eliminate_forced(
        self: &Arc<Self>,
        game_id: GameId,
        rt: &mut GameRuntime,
        victim: &Player,
        reason: EliminationReason,
    ) -> Result<()> {
        let now = self.now();

        // 1. Store mutation.
        self.store
            .eliminate_player(game_id, victim.address, now, reason.as_str())
            .await?;

        // 2. Chain rewiring.
        let rewire = match rt.chain.remove(victim.address) {
            RemovalOutcome::NotInChain => None,
            RemovalOutcome::Collapsed => {
                // Both remaining edges died with the cycle.
                self.store.clear_assignments(game_id).await?;
                None
            }
            RemovalOutcome::Rewired { hunter, new_target } => {
                self.store.delete_assignment(game_id, victim.address).await?;
                self.store
                    .upsert_assignment(&crate::types::entities::TargetAssignment {
                        game_id,
                        hunter,
                        target: new_target,
                        assigned_at: now,
                    })
                    .await?;
                Some((hunter, new_target))
            }
        };

        // 4. Settlement, off the request path.
        self.spawn_operator(
            game_id,
            OperatorRequest::EliminatePlayer {
                number: victim.number.get(),
                reason: reason.code(),
            },
        );

        info!(%game_id, player = victim.number.get(), reason = reason.as_str(), "Player eliminated");
        let players = self.store.players(game_id).await?;
        self.finish_elimination(game_id, rt, &players, victim, None, reason.as_str(), rewire)
            .await
    }

    /// Steps 3 and 5–8 of the elimination flow, shared by both paths.
    #[allow(clippy::too_many_arguments)]
    async fn finish_elimination(
        self: &Arc<Self>,
        game_id: GameId,
        rt: &mut GameRuntime,
        players: &[Player],
        victim: &Player,
        eliminator: Option<PlayerNumber>,
        reason: &str,
        rewire: Option<(WalletAddress, WalletAddress)>,
    ) -> Result<()> {
        // 3. Zone tracker forgets the victim.
        if let Some(zone) = rt.zone.as_mut() {
            zone.clear_player(victim.address);
        }

        // 5. Everyone learns about the elimination.
        self.rooms.broadcast(
            game_id,
            &ServerMessage::PlayerEliminated {
                player_number: victim.number,
                eliminator_number: eliminator,
                reason: reason.to_owned(),
            },
        );

        // 6. Exactly the two affected players learn about the rewire.
        if let Some((hunter, new_target)) = rewire {
            let hunter_number = number_of(players, hunter);
            let target_number = number_of(players, new_target);
            let hunters_hunter = rt.chain.hunter_of(hunter).and_then(|a| number_of(players, a));
            if let (Some(target), Some(own_hunter)) = (target_number, hunters_hunter) {
                self.rooms.send_to_player(
                    game_id,
                    hunter,
                    &ServerMessage::TargetAssigned {
                        target: TargetInfo {
                            player_number: target,
                        },
                        hunter_player_number: own_hunter,
                    },
                );
            }
            if let Some(hunter_number) = hunter_number {
                self.rooms.send_to_player(
                    game_id,
                    new_target,
                    &ServerMessage::HunterUpdated {
                        hunter_player_number: hunter_number,
                    },
                );
            }
        }

        // 7. Leaderboard.
        let fresh = self.store.players(game_id).await?;
        self.rooms.broadcast(
            game_id,
            &ServerMessage::LeaderboardUpdate {
                entries: leaderboard::entries(&fresh),
            },
        );

        // 8. End condition.
        let alive = self.store.alive_count(game_id).await?;
        if alive <= 1 {
            self.maybe_end(game_id, rt, alive);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENDING
    // ═══════════════════════════════════════════════════════════════════════

    fn maybe_end(self: &Arc<Self>, game_id: GameId, rt: &mut GameRuntime, alive: u32) {
        if alive > 1 {
            return;
        }
        if rt.ending {
            info!(%game_id, "Duplicate end suppressed");
            return;
        }
        rt.ending = true;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.end_game(game_id).await {
                error!(%game_id, error = %e, "Game end failed");
            }
        });
    }

    /// Compute winners, settle, finalize. Runs in its own task; the
    /// per-game `ending` flag keeps concurrent paths out.
    async fn end_game(self: &Arc<Self>, game_id: GameId) -> Result<()> {
        let game = self.require_game(game_id).await?;
        if game.phase.is_terminal() {
            return Ok(());
        }

        let players = self.store.players(game_id).await?;
        let winners = leaderboard::resolve_winners(&players, &game.prize_split);

        if !self.simulated.contains(&game_id) {
            self.submit_operator(
                game_id,
                OperatorRequest::EndGame {
                    winner1: winners.winner1.number,
                    winner2: winners.winner2.number,
                    winner3: winners.winner3.number,
                    top_killer: winners.top_killer.number,
                },
            )
            .await?;
        }

        self.finalize_end(game_id, winners).await
    }

    async fn finalize_end(self: &Arc<Self>, game_id: GameId, winners: Winners) -> Result<()> {
        self.store
            .set_ended(
                game_id,
                self.now(),
                winners.winner1.address_opt(),
                winners.winner2.address_opt(),
                winners.winner3.address_opt(),
                winners.top_killer.address_opt(),
            )
            .await?;
        self.store.clear_assignments(game_id).await?;

        info!(%game_id, winner1 = winners.winner1.number, "Game ended");
        self.rooms.broadcast(
            game_id,
            &ServerMessage::GameEnded {
                winner1: winners.winner1.number,
                winner2: winners.winner2.number,
                winner3: winners.winner3.number,
                top_killer: winners.top_killer.number,
            },
        );
        self.cleanup_game(game_id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // OPERATOR OUTBOX
    // ═══════════════════════════════════════════════════════════════════════

    /// Fire-and-forget operator submission (kills, eliminations, start).
    fn spawn_operator(self: &Arc<Self>, game_id: GameId, request: OperatorRequest) {
        if self.simulated.contains(&game_id) {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = this.submit_operator(game_id, request).await;
        });
    }

    /// Submit one operator transaction through the outbox: insert a
    /// pending row, call the contract, resolve the row. Submissions are
    /// serialized per game.
    async fn submit_operator(
        self: &Arc<Self>,
        game_id: GameId,
        request: OperatorRequest,
    ) -> Result<()> {
        let lock = self
            .outbox_locks
            .entry(game_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let action = request.action();
        let now = self.now();
        let row = OperatorTx {
            id: Uuid::new_v4(),
            game_id,
            action,
            status: TxStatus::Pending,
            tx_hash: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_operator_tx(&row).await?;

        let raw_id = game_id.get();
        let result = match request {
            OperatorRequest::StartGame => self.operator.start_game(raw_id).await,
            OperatorRequest::RecordKill { hunter, target, .. } => {
                self.operator.record_kill(raw_id, hunter, target).await
            }
            OperatorRequest::EliminatePlayer { number, reason } => {
                self.operator.eliminate_player(raw_id, number, reason).await
            }
            OperatorRequest::EndGame {
                winner1,
                winner2,
                winner3,
                top_killer,
            } => {
                self.operator
                    .end_game(raw_id, winner1, winner2, winner3, top_killer)
                    .await
            }
            OperatorRequest::TriggerCancellation => {
                self.operator.trigger_cancellation(raw_id).await
            }
            OperatorRequest::TriggerExpiry => self.operator.trigger_expiry(raw_id).await,
        };

        match result {
            Ok(hash) => {
                let hash = format!("{hash:#x}");
                self.store
                    .resolve_operator_tx(
                        row.id,
                        TxStatus::Confirmed,
                        Some(&hash),
                        None,
                        self.now(),
                    )
                    .await?;
                if let OperatorRequest::RecordKill { kill_id, .. } = request {
                    self.store.set_kill_tx_hash(kill_id, &hash).await?;
                }
                Ok(())
            }
            Err(e) => {
                // The chain is the source of truth; state is not rolled
                // back. The event stream heals discrepancies later.
                error!(%game_id, action = action.as_str(), error = %e, "Operator transaction failed");
                self.store
                    .resolve_operator_tx(
                        row.id,
                        TxStatus::Failed,
                        None,
                        Some(&e.to_string()),
                        self.now(),
                    )
                    .await?;
                Err(InfraError::ChainSubmissionFailed(e).into())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SNAPSHOTS (WS auth, spectate, REST status)
    // ═══════════════════════════════════════════════════════════════════════

    /// Payload for `auth:success` after a player joins their room.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown games or unregistered players.
    pub async fn auth_snapshot(
        self: &Arc<Self>,
        game_id: GameId,
        address: WalletAddress,
    ) -> Result<ServerMessage> {
        let game = self.require_game(game_id).await?;
        let player = self
            .store
            .player(game_id, address)
            .await?
            .ok_or(VerifyError::NotRegistered)?;

        let mut target = None;
        let mut hunter_player_number = None;
        let mut zone = None;
        let mut heartbeat_deadline = None;

        if game.sub_phase == Some(SubPhase::Game) && player.is_alive {
            let rt_arc = self.runtime(game_id);
            let rt = rt_arc.lock().await;
            let players = self.store.players(game_id).await?;
            target = rt
                .chain
                .target_of(address)
                .and_then(|a| number_of(&players, a))
                .map(|player_number| TargetInfo { player_number });
            hunter_player_number = rt
                .chain
                .hunter_of(address)
                .and_then(|a| number_of(&players, a));
            zone = rt.zone.as_ref().map(|z| z.zone_state(self.now()));
            heartbeat_deadline = player.last_heartbeat_at.map(|last| {
                (last + ChronoDuration::seconds(
                    i64::try_from(self.rules.heartbeat_interval_seconds).unwrap_or(0),
                ))
                .timestamp()
            });
        }

        Ok(ServerMessage::AuthSuccess {
            address,
            player_number: player.number,
            sub_phase: game.sub_phase,
            target,
            hunter_player_number,
            zone,
            heartbeat_deadline,
        })
    }

    /// Payload for `spectate:init` after a spectator joins.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown games.
    pub async fn spectate_snapshot(self: &Arc<Self>, game_id: GameId) -> Result<ServerMessage> {
        let game = self.require_game(game_id).await?;
        let players = self.store.players(game_id).await?;
        let pings = self.store.latest_pings(game_id).await?;

        let positions: Vec<SpectatorPlayer> = players
            .iter()
            .filter_map(|p| {
                pings
                    .iter()
                    .find(|ping| ping.address == p.address)
                    .map(|ping| SpectatorPlayer {
                        player_number: p.number,
                        lat: ping.lat,
                        lng: ping.lng,
                        is_alive: p.is_alive,
                        kills: p.kills,
                    })
            })
            .collect();

        let zone = if game.sub_phase == Some(SubPhase::Game) {
            let rt_arc = self.runtime(game_id);
            let rt = rt_arc.lock().await;
            rt.zone.as_ref().map(|z| z.zone_state(self.now()))
        } else {
            None
        };

        Ok(ServerMessage::SpectateInit {
            game_id,
            phase: game.phase,
            sub_phase: game.sub_phase,
            player_count: game.player_count,
            alive_count: u32::try_from(players.iter().filter(|p| p.is_alive).count()).unwrap_or(0),
            leaderboard: leaderboard::entries(&players),
            players: positions,
            zone,
        })
    }

    /// REST status snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown games.
    pub async fn game_status(self: &Arc<Self>, game_id: GameId) -> Result<GameStatus> {
        let game = self.require_game(game_id).await?;
        let players = self.store.players(game_id).await?;

        let zone = if game.sub_phase == Some(SubPhase::Game) {
            let rt_arc = self.runtime(game_id);
            let rt = rt_arc.lock().await;
            rt.zone.as_ref().map(|z| z.zone_state(self.now()))
        } else {
            None
        };

        let pregame_ends_at = (game.sub_phase == Some(SubPhase::Pregame))
            .then(|| {
                game.sub_phase_started_at.map(|started| {
                    (started
                        + ChronoDuration::seconds(
                            i64::try_from(self.rules.pregame_duration_seconds).unwrap_or(0),
                        ))
                    .timestamp()
                })
            })
            .flatten();

        let winners = game.phase.is_terminal().then(|| StatusWinners {
            winner1: winner_number(&players, game.winner1),
            winner2: winner_number(&players, game.winner2),
            winner3: winner_number(&players, game.winner3),
            top_killer: winner_number(&players, game.top_killer),
        });

        Ok(GameStatus {
            game_id,
            phase: game.phase,
            sub_phase: game.sub_phase,
            player_count: game.player_count,
            alive_count: u32::try_from(players.iter().filter(|p| p.is_alive).count()).unwrap_or(0),
            required_checked_in: game.required_checked_in(),
            checked_in_count: checked_in_count(&players),
            leaderboard: leaderboard::entries(&players),
            zone,
            pregame_ends_at,
            winners,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn checked_in_count(players: &[Player]) -> u32 {
    u32::try_from(players.iter().filter(|p| p.is_alive && p.checked_in).count()).unwrap_or(0)
}

/// Auto-seed target: 5 % of the alive count, rounded up, at least one.
const fn seed_target(alive: u32) -> u32 {
    let target = alive.div_ceil(20);
    if target == 0 { 1 } else { target }
}

fn number_of(players: &[Player], address: WalletAddress) -> Option<PlayerNumber> {
    players
        .iter()
        .find(|p| p.address == address)
        .map(|p| p.number)
}

fn winner_number(players: &[Player], winner: Option<WalletAddress>) -> u16 {
    winner
        .and_then(|addr| number_of(players, addr))
        .map_or(0, |n| n.get())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_target_is_five_percent_rounded_up() {
        assert_eq!(seed_target(0), 1);
        assert_eq!(seed_target(1), 1);
        assert_eq!(seed_target(6), 1);
        assert_eq!(seed_target(20), 1);
        assert_eq!(seed_target(21), 2);
        assert_eq!(seed_target(40), 2);
        assert_eq!(seed_target(100), 5);
    }

    #[test]
    fn winner_number_maps_addresses_back() {
        let players: Vec<Player> = Vec::new();
        assert_eq!(winner_number(&players, None), 0);
        assert_eq!(winner_number(&players, Some(WalletAddress::new([1; 20]))), 0);
    }
}
