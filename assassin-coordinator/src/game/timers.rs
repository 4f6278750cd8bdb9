//! Per-game timer and task registry.
//!
//! Every timer and periodic loop a game owns (deadline checks, pregame
//! countdown, check-in monitor, auto-seed, the 1 Hz tick) registers its
//! task handle here under the game id, sharing one cancellation token per
//! game. `cancel(game_id)` stops them all deterministically at game end
//! or cancellation; `cancel_all()` is the shutdown path.

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::primitives::GameId;

#[derive(Debug, Default)]
struct GameTimers {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Registry of per-game timer tasks.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    games: DashMap<GameId, GameTimers>,
}

impl TimerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cancellation token shared by all of a game's tasks.
    ///
    /// Created on first use; loops must check it every iteration.
    #[must_use]
    pub fn token(&self, game_id: GameId) -> CancellationToken {
        self.games.entry(game_id).or_default().token.clone()
    }

    /// Register a spawned task under the game.
    pub fn register(&self, game_id: GameId, handle: JoinHandle<()>) {
        let mut entry = self.games.entry(game_id).or_default();
        // Completed tasks accumulate otherwise (one per timer ever set).
        entry.handles.retain(|h| !h.is_finished());
        entry.handles.push(handle);
    }

    /// Cancel and drop every task of a game.
    pub fn cancel(&self, game_id: GameId) {
        if let Some((_, timers)) = self.games.remove(&game_id) {
            timers.token.cancel();
            for handle in timers.handles {
                handle.abort();
            }
        }
    }

    /// Cancel every game's tasks (shutdown).
    pub fn cancel_all(&self) {
        let ids: Vec<GameId> = self.games.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Number of live tasks registered for a game.
    #[must_use]
    pub fn task_count(&self, game_id: GameId) -> usize {
        self.games
            .get(&game_id)
            .map_or(0, |t| t.handles.iter().filter(|h| !h.is_finished()).count())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
