//! In-memory simulated settlement for integration tests.
//!
//! Implements both [`SettlementReader`] and [`SettlementOperator`] over an
//! in-memory event log, so the coordinator under test sees the same
//! submit-then-observe-event loop it sees against a real chain. Chain time
//! is a plain settable value; tests warp it past deadlines.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy::primitives::{Address, B256, TxHash, U256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{Result, SettlementError};
use crate::events::ChainEvent;
use crate::traits::{
    GameSetup, OnchainGame, OnchainPhase, SettlementOperator, SettlementReader, ZoneShrinkSpec,
};

/// A recorded operator call, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCall {
    /// `startGame(gameId)`
    StartGame(u64),
    /// `recordKill(gameId, hunter, target)`
    RecordKill(u64, u16, u16),
    /// `eliminatePlayer(gameId, player, reason)`
    EliminatePlayer(u64, u16, u8),
    /// `endGame(gameId, w1, w2, w3, topKiller)`
    EndGame(u64, u16, u16, u16, u16),
    /// `triggerCancellation(gameId)`
    TriggerCancellation(u64),
    /// `triggerExpiry(gameId)`
    TriggerExpiry(u64),
}

#[derive(Debug)]
struct SimGame {
    setup: GameSetup,
    shrinks: Vec<ZoneShrinkSpec>,
    phase: OnchainPhase,
    player_count: u32,
    total_collected: U256,
    next_player_number: u16,
}

#[derive(Debug)]
struct SimState {
    chain_time: DateTime<Utc>,
    latest_block: u64,
    events: BTreeMap<u64, Vec<ChainEvent>>,
    games: HashMap<u64, SimGame>,
    next_tx: u64,
    calls: Vec<OperatorCall>,
    failing: HashSet<&'static str>,
}

/// Simulated settlement contract.
#[derive(Debug)]
pub struct SimulatedSettlement {
    state: Mutex<SimState>,
}

impl SimulatedSettlement {
    /// Create a fresh chain whose clock starts at `chain_time`.
    #[must_use]
    pub fn new(chain_time: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(SimState {
                chain_time,
                latest_block: 0,
                events: BTreeMap::new(),
                games: HashMap::new(),
                next_tx: 1,
                calls: Vec::new(),
                failing: HashSet::new(),
            }),
        }
    }

    /// Create a game and emit `GameCreated`.
    pub fn create_game(
        &self,
        game_id: u64,
        creator: Address,
        setup: GameSetup,
        shrinks: Vec<ZoneShrinkSpec>,
    ) {
        let mut state = self.state.lock();
        state.games.insert(
            game_id,
            SimGame {
                setup,
                shrinks,
                phase: OnchainPhase::Registration,
                player_count: 0,
                total_collected: U256::ZERO,
                next_player_number: 1,
            },
        );
        push_event(&mut state, ChainEvent::GameCreated { game_id, creator });
    }

    /// Register a player and emit `PlayerRegistered`; returns their number.
    ///
    /// # Panics
    ///
    /// Panics if the game does not exist (test setup error).
    #[allow(clippy::unwrap_used)]
    pub fn register_player(&self, game_id: u64, player: Address) -> u16 {
        let mut state = self.state.lock();
        let game = state.games.get_mut(&game_id).unwrap();
        let player_number = game.next_player_number;
        game.next_player_number += 1;
        game.player_count += 1;
        game.total_collected += game.setup.entry_fee;
        let total_collected = game.total_collected;
        push_event(
            &mut state,
            ChainEvent::PlayerRegistered {
                game_id,
                player,
                player_number,
                total_collected,
            },
        );
        player_number
    }

    /// Set chain time to an absolute value.
    pub fn set_chain_time(&self, time: DateTime<Utc>) {
        self.state.lock().chain_time = time;
    }

    /// Move chain time forward.
    pub fn advance_chain_time(&self, seconds: i64) {
        let mut state = self.state.lock();
        state.chain_time += Duration::seconds(seconds);
    }

    /// All operator calls recorded so far, in submission order.
    #[must_use]
    pub fn calls(&self) -> Vec<OperatorCall> {
        self.state.lock().calls.clone()
    }

    /// Append an arbitrary event at the next block (claim events etc.).
    pub fn emit(&self, event: ChainEvent) {
        let mut state = self.state.lock();
        push_event(&mut state, event);
    }

    /// Make the named operator action fail until cleared.
    pub fn set_failing(&self, action: &'static str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(action);
        } else {
            state.failing.remove(action);
        }
    }

    fn operator_call(
        &self,
        action: &'static str,
        game_id: u64,
        call: OperatorCall,
        require_phase: OnchainPhase,
        transition: Option<(OnchainPhase, Option<ChainEvent>)>,
    ) -> Result<TxHash> {
        let mut state = self.state.lock();
        if state.failing.contains(action) {
            return Err(SettlementError::Rpc(format!("{action}: simulated failure")));
        }
        let game = state
            .games
            .get_mut(&game_id)
            .ok_or_else(|| SettlementError::Reverted(format!("{action}: unknown game")))?;
        if game.phase != require_phase {
            return Err(SettlementError::Reverted(format!(
                "{action}: wrong phase {:?}",
                game.phase
            )));
        }
        if let Some((next_phase, event)) = transition {
            game.phase = next_phase;
            if let Some(event) = event {
                push_event(&mut state, event);
            }
        }
        state.calls.push(call);
        let hash = B256::from(U256::from(state.next_tx));
        state.next_tx += 1;
        Ok(hash)
    }
}

fn push_event(state: &mut SimState, event: ChainEvent) {
    state.latest_block += 1;
    let block = state.latest_block;
    state.events.entry(block).or_default().push(event);
}

// ═══════════════════════════════════════════════════════════════════════════════
// READER IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SettlementReader for SimulatedSettlement {
    async fn latest_block(&self) -> Result<u64> {
        Ok(self.state.lock().latest_block)
    }

    async fn chain_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.state.lock().chain_time)
    }

    async fn fetch_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, ChainEvent)>> {
        let state = self.state.lock();
        Ok(state
            .events
            .range(from_block..=to_block)
            .flat_map(|(block, events)| events.iter().map(|e| (*block, e.clone())))
            .collect())
    }

    async fn fetch_game(&self, game_id: u64) -> Result<OnchainGame> {
        let state = self.state.lock();
        let game = state
            .games
            .get(&game_id)
            .ok_or_else(|| SettlementError::Reverted("unknown game".into()))?;
        Ok(OnchainGame {
            setup: game.setup.clone(),
            phase: game.phase,
            player_count: game.player_count,
            total_collected: game.total_collected,
        })
    }

    async fn fetch_zone_shrinks(&self, game_id: u64) -> Result<Vec<ZoneShrinkSpec>> {
        let state = self.state.lock();
        let game = state
            .games
            .get(&game_id)
            .ok_or_else(|| SettlementError::Reverted("unknown game".into()))?;
        Ok(game.shrinks.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATOR IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SettlementOperator for SimulatedSettlement {
    async fn start_game(&self, game_id: u64) -> Result<TxHash> {
        let player_count = self.state.lock().games.get(&game_id).map_or(0, |g| g.player_count);
        self.operator_call(
            "startGame",
            game_id,
            OperatorCall::StartGame(game_id),
            OnchainPhase::Registration,
            Some((
                OnchainPhase::Active,
                Some(ChainEvent::GameStarted {
                    game_id,
                    player_count,
                }),
            )),
        )
    }

    async fn record_kill(&self, game_id: u64, hunter: u16, target: u16) -> Result<TxHash> {
        self.operator_call(
            "recordKill",
            game_id,
            OperatorCall::RecordKill(game_id, hunter, target),
            OnchainPhase::Active,
            None,
        )
    }

    async fn eliminate_player(&self, game_id: u64, player: u16, reason: u8) -> Result<TxHash> {
        self.operator_call(
            "eliminatePlayer",
            game_id,
            OperatorCall::EliminatePlayer(game_id, player, reason),
            OnchainPhase::Active,
            None,
        )
    }

    async fn end_game(
        &self,
        game_id: u64,
        winner1: u16,
        winner2: u16,
        winner3: u16,
        top_killer: u16,
    ) -> Result<TxHash> {
        self.operator_call(
            "endGame",
            game_id,
            OperatorCall::EndGame(game_id, winner1, winner2, winner3, top_killer),
            OnchainPhase::Active,
            Some((
                OnchainPhase::Ended,
                Some(ChainEvent::GameEnded {
                    game_id,
                    winner1,
                    winner2,
                    winner3,
                    top_killer,
                }),
            )),
        )
    }

    async fn trigger_cancellation(&self, game_id: u64) -> Result<TxHash> {
        self.operator_call(
            "triggerCancellation",
            game_id,
            OperatorCall::TriggerCancellation(game_id),
            OnchainPhase::Registration,
            Some((
                OnchainPhase::Cancelled,
                Some(ChainEvent::GameCancelled { game_id, reason: 0 }),
            )),
        )
    }

    async fn trigger_expiry(&self, game_id: u64) -> Result<TxHash> {
        self.operator_call(
            "triggerExpiry",
            game_id,
            OperatorCall::TriggerExpiry(game_id),
            OnchainPhase::Active,
            Some((
                OnchainPhase::Cancelled,
                Some(ChainEvent::GameCancelled { game_id, reason: 1 }),
            )),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::traits::PrizeSplit;

    fn setup() -> GameSetup {
        GameSetup {
            title: "test".into(),
            entry_fee: U256::from(10),
            min_players: 3,
            max_players: 10,
            registration_deadline: Utc::now(),
            game_date: Utc::now(),
            expiry_deadline: Utc::now(),
            max_duration_seconds: 3600,
            zone_center: (0, 0),
            meeting_point: None,
            prize_split: PrizeSplit::default(),
        }
    }

    #[tokio::test]
    async fn lifecycle_events_flow_in_block_order() {
        let sim = SimulatedSettlement::new(Utc::now());
        sim.create_game(1, Address::repeat_byte(1), setup(), vec![]);
        sim.register_player(1, Address::repeat_byte(2));
        sim.register_player(1, Address::repeat_byte(3));

        let latest = sim.latest_block().await.unwrap();
        let events = sim.fetch_events(1, latest).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].1, ChainEvent::GameCreated { .. }));
        assert!(matches!(
            events[2].1,
            ChainEvent::PlayerRegistered {
                player_number: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_reverts_when_not_in_registration() {
        let sim = SimulatedSettlement::new(Utc::now());
        sim.create_game(1, Address::repeat_byte(1), setup(), vec![]);
        sim.trigger_cancellation(1).await.unwrap();

        // Second attempt reverts: the game is already cancelled.
        assert!(sim.trigger_cancellation(1).await.is_err());
        assert_eq!(sim.calls(), vec![OperatorCall::TriggerCancellation(1)]);
    }

    #[tokio::test]
    async fn start_then_end_updates_phase() {
        let sim = SimulatedSettlement::new(Utc::now());
        sim.create_game(1, Address::repeat_byte(1), setup(), vec![]);
        sim.start_game(1).await.unwrap();
        assert_eq!(
            sim.fetch_game(1).await.unwrap().phase,
            OnchainPhase::Active
        );
        sim.end_game(1, 4, 2, 0, 4).await.unwrap();
        assert_eq!(sim.fetch_game(1).await.unwrap().phase, OnchainPhase::Ended);
    }
}
