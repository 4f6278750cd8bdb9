//! Shared test harness: in-memory store, simulated settlement, fake
//! clock, and a coordinator wired together the same way `main` wires the
//! real collaborators.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use alloy::primitives::U256;
use assassin_coordinator::ports::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Duration;

use assassin_coordinator::chain::ChainAdapter;
use assassin_coordinator::config::GameSettings;
use assassin_coordinator::game::{CheckinRequest, Coordinator};
use assassin_coordinator::ports::clock::FakeClock;
use assassin_coordinator::ports::store::{
    AssignmentStore, GameStore, LocationStore, PlayerStore,
};
use assassin_coordinator::qr;
use assassin_coordinator::realtime::{Registration, Rooms};
use assassin_coordinator::store::MemoryStore;
use assassin_coordinator::types::entities::{Game, LocationPing, Player, ZoneShrink};
use assassin_coordinator::types::enums::GamePhase;
use assassin_coordinator::types::messages::ServerMessage;
use assassin_coordinator::types::primitives::{GameId, PlayerNumber, WalletAddress};
use settlement_client::{GameSetup, PrizeSplit, SimulatedSettlement, ZoneShrinkSpec};

/// Fixed test epoch.
pub const T0: i64 = 1_700_000_000;

pub struct Harness {
    pub sim: Arc<SimulatedSettlement>,
    pub store: Arc<MemoryStore>,
    pub rooms: Arc<Rooms>,
    pub clock: Arc<FakeClock>,
    pub coordinator: Arc<Coordinator>,
    pub adapter: ChainAdapter,
}

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(T0, 0).unwrap()
}

pub fn default_rules() -> GameSettings {
    GameSettings {
        checkin_duration_seconds: 30,
        pregame_duration_seconds: 5,
        zone_grace_seconds: 60,
        kill_proximity_meters: 500.0,
        heartbeat_proximity_meters: 500.0,
        heartbeat_interval_seconds: 600,
        heartbeat_disable_threshold: 2,
        ble_required: true,
    }
}

pub fn default_setup() -> GameSetup {
    GameSetup {
        title: "midnight run".into(),
        entry_fee: U256::from(10_000_000_000_000_000_u128),
        min_players: 3,
        max_players: 10,
        registration_deadline: t0() + ChronoDuration::seconds(100),
        game_date: t0() + ChronoDuration::seconds(200),
        expiry_deadline: t0() + ChronoDuration::seconds(4000),
        max_duration_seconds: 7200,
        zone_center: (0, 0),
        meeting_point: None,
        prize_split: PrizeSplit {
            bps_1st: 3500,
            bps_2nd: 1500,
            bps_3rd: 1000,
            bps_kills: 2000,
            bps_creator: 1000,
        },
    }
}

pub fn default_shrinks() -> Vec<ZoneShrinkSpec> {
    vec![
        ZoneShrinkSpec {
            at_second: 0,
            radius_meters: 2000,
        },
        ZoneShrinkSpec {
            at_second: 600,
            radius_meters: 1000,
        },
        ZoneShrinkSpec {
            at_second: 1200,
            radius_meters: 300,
        },
    ]
}

pub fn addr(n: u8) -> WalletAddress {
    WalletAddress::new([n; 20])
}

pub fn token(n: u16) -> String {
    format!("aa:bb:cc:dd:ee:{n:02x}")
}

impl Harness {
    pub fn new(rules: GameSettings) -> Self {
        let sim = Arc::new(SimulatedSettlement::new(t0()));
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(Rooms::new());
        let clock = Arc::new(FakeClock::new(t0()));
        let coordinator = Coordinator::new(
            store.clone(),
            rooms.clone(),
            sim.clone(),
            sim.clone(),
            clock.clone(),
            rules,
        );
        let adapter = ChainAdapter::new(
            store.clone(),
            sim.clone(),
            coordinator.clone(),
            Duration::from_millis(100),
        );
        Self {
            sim,
            store,
            rooms,
            clock,
            coordinator,
            adapter,
        }
    }

    /// Apply all pending chain events.
    pub async fn sync(&self) {
        self.adapter.run_once().await.unwrap();
    }

    /// Let spawned background tasks (operator submissions, game end) run.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    /// Move both the coordinator clock and chain time forward.
    pub fn advance(&self, seconds: i64) {
        self.clock.advance(ChronoDuration::seconds(seconds));
        self.sim.advance_chain_time(seconds);
    }

    pub fn attach(&self, game_id: GameId, address: WalletAddress) -> Registration {
        self.rooms.attach_player(game_id, address)
    }

    pub async fn game(&self, game_id: GameId) -> Game {
        self.store.game(game_id).await.unwrap().unwrap()
    }

    pub async fn players(&self, game_id: GameId) -> Vec<Player> {
        self.store.players(game_id).await.unwrap()
    }

    pub async fn number_of(&self, game_id: GameId, address: WalletAddress) -> PlayerNumber {
        self.store
            .player(game_id, address)
            .await
            .unwrap()
            .unwrap()
            .number
    }

    pub async fn target_of(&self, game_id: GameId, hunter: WalletAddress) -> WalletAddress {
        self.store
            .assignments(game_id)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.hunter == hunter)
            .unwrap()
            .target
    }

    pub async fn hunter_of(&self, game_id: GameId, target: WalletAddress) -> WalletAddress {
        self.store
            .assignments(game_id)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.target == target)
            .unwrap()
            .hunter
    }

    /// Create a game on the simulated chain, register `count` players,
    /// and sync: the game sits in REGISTRATION afterwards.
    pub async fn create_game(&self, game_id: u64, count: u8) -> Vec<WalletAddress> {
        self.create_game_with(game_id, count, default_setup()).await
    }

    pub async fn create_game_with(
        &self,
        game_id: u64,
        count: u8,
        setup: GameSetup,
    ) -> Vec<WalletAddress> {
        self.sim
            .create_game(game_id, addr(200).into(), setup, default_shrinks());
        let addrs: Vec<WalletAddress> = (1..=count).map(addr).collect();
        for a in &addrs {
            self.sim.register_player(game_id, (*a).into());
        }
        self.sync().await;
        addrs
    }

    /// Drive a game all the way into the hunt: auto-start, check-in
    /// (one auto-seed plus viral scans), monitor completion, pregame
    /// skip, target chain built.
    pub async fn start_hunt(&self, game_id: u64, count: u8) -> Vec<WalletAddress> {
        let addrs = self.create_game(game_id, count).await;
        let game_id = GameId::new(game_id);

        // Past the game date: the operator starts the game.
        self.advance(250);
        self.coordinator.check_auto_start().await.unwrap();
        self.settle().await;
        self.sync().await;
        assert_eq!(self.game(game_id).await.phase, GamePhase::Active);

        // Everyone reports presence at the meeting point.
        for a in &addrs {
            self.coordinator
                .record_location(game_id, *a, 0.0, 0.0, self.clock.timestamp())
                .await
                .unwrap();
        }

        // Server seeds the first link of the viral chain.
        self.coordinator
            .run_auto_seed_once(game_id)
            .await
            .unwrap();
        let players = self.players(game_id).await;
        let seeded: Vec<&Player> = players.iter().filter(|p| p.checked_in).collect();
        assert_eq!(seeded.len(), 1, "exactly one auto-seeded player");
        let seed = seeded[0];

        // The seed attaches their Bluetooth token via resubmission.
        self.coordinator
            .client_checkin(
                game_id,
                seed.address,
                CheckinRequest {
                    lat: 0.0,
                    lng: 0.0,
                    bluetooth_token: Some(token(seed.number.get())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Everyone else scans the seed.
        let seed_payload = qr::encode(game_id, seed.number);
        for p in players.iter().filter(|p| !p.checked_in) {
            self.coordinator
                .client_checkin(
                    game_id,
                    p.address,
                    CheckinRequest {
                        lat: 0.0,
                        lng: 0.0,
                        qr_payload: Some(seed_payload.clone()),
                        bluetooth_token: Some(token(p.number.get())),
                        ble_nearby: vec![token(seed.number.get())],
                    },
                )
                .await
                .unwrap();
        }

        // Monitor observes completion and opens pregame.
        let still_checking = self
            .coordinator
            .run_checkin_monitor_once(game_id)
            .await
            .unwrap();
        assert!(!still_checking, "check-in should be complete");

        // Skip the countdown (the scheduled timer no-ops once the
        // sub-phase moved on).
        self.coordinator.begin_game(game_id).await.unwrap();
        addrs
    }
}

impl Harness {
    /// A second coordinator over the same simulated chain with a fresh
    /// store, for replay tests.
    pub fn fork(&self) -> Self {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(Rooms::new());
        let clock = Arc::new(FakeClock::new(t0()));
        let coordinator = Coordinator::new(
            store.clone(),
            rooms.clone(),
            self.sim.clone(),
            self.sim.clone(),
            clock.clone(),
            default_rules(),
        );
        let adapter = ChainAdapter::new(
            store.clone(),
            self.sim.clone(),
            coordinator.clone(),
            Duration::from_millis(100),
        );
        Self {
            sim: self.sim.clone(),
            store,
            rooms,
            clock,
            coordinator,
            adapter,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE SEEDING (recovery tests)
// ═══════════════════════════════════════════════════════════════════════════════

/// Build a game row directly (recovery tests seed the store without a
/// chain history).
pub fn make_game(game_id: GameId) -> Game {
    Game {
        id: game_id,
        title: "seeded".into(),
        entry_fee: "10000000000000000".into(),
        min_players: 3,
        max_players: 10,
        registration_deadline: t0() + ChronoDuration::seconds(100),
        game_date: t0() + ChronoDuration::seconds(200),
        expiry_deadline: t0() + ChronoDuration::seconds(4000),
        max_duration_seconds: 7200,
        zone_center_lat: 0,
        zone_center_lng: 0,
        meeting_lat: None,
        meeting_lng: None,
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

/// Build an alive, checked-in player row.
pub fn make_player(game_id: GameId, n: u16) -> Player {
    Player {
        game_id,
        address: addr(u8::try_from(n).unwrap()),
        number: PlayerNumber::new(n).unwrap(),
        is_alive: true,
        kills: 0,
        eliminated_at: None,
        eliminated_by: None,
        checked_in: true,
        bluetooth_token: Some(token(n)),
        last_heartbeat_at: None,
        has_claimed: false,
        registered_at: t0(),
    }
}

/// Insert the default shrink schedule as store rows.
pub async fn seed_shrinks(store: &MemoryStore, game_id: GameId) {
    let rows: Vec<ZoneShrink> = default_shrinks()
        .iter()
        .map(|s| ZoneShrink {
            game_id,
            at_second: s.at_second,
            radius_meters: s.radius_meters,
        })
        .collect();
    store.insert_zone_shrinks(game_id, &rows).await.unwrap();
}

/// Record a ping row with an explicit timestamp.
pub async fn seed_ping(
    store: &MemoryStore,
    game_id: GameId,
    address: WalletAddress,
    lng: f64,
    recorded_at: DateTime<Utc>,
    in_zone: bool,
) {
    store
        .record_ping(&LocationPing {
            game_id,
            address,
            lat: 0.0,
            lng,
            recorded_at,
            in_zone,
        })
        .await
        .unwrap();
}

/// Drain every queued message from a registration.
pub fn drain(registration: &mut Registration) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = registration.rx.try_recv() {
        messages.push(message);
    }
    messages
}

/// Count messages matching a predicate.
pub fn count_where(messages: &[ServerMessage], f: impl Fn(&ServerMessage) -> bool) -> usize {
    messages.iter().filter(|m| f(m)).count()
}
