//! Game core: target chain, zone tracker, verifiers, leaderboard, and
//! the per-game lifecycle coordinator.

pub mod coordinator;
pub mod leaderboard;
pub mod target_chain;
pub mod timers;
pub mod verifier;
pub mod zone;

pub use coordinator::{CheckinRequest, Coordinator, GameStatus, StatusWinners};
pub use leaderboard::{Winners, resolve_winners};
pub use target_chain::{ChainError, KillOutcome, RemovalOutcome, TargetChain};
pub use timers::TimerRegistry;
pub use verifier::{GameSnapshot, HeartbeatVerdict, KillVerdict, verify_heartbeat, verify_kill};
pub use zone::{LocationVerdict, ZoneTracker};
