//! Deterministic leaderboard ordering and final winner resolution.

use settlement_client::PrizeSplit;

use crate::types::entities::Player;
use crate::types::messages::LeaderboardEntry;
use crate::types::primitives::{PlayerNumber, WalletAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// ORDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Sort players into leaderboard order (stable, total):
///
/// 1. Alive before eliminated.
/// 2. Among eliminated: later `eliminated_at` first (surviving longer
///    ranks higher).
/// 3. More kills first.
/// 4. Lower player number first.
pub fn rank(players: &mut [Player]) {
    players.sort_by(|a, b| {
        b.is_alive
            .cmp(&a.is_alive)
            .then_with(|| b.eliminated_at.cmp(&a.eliminated_at))
            .then_with(|| b.kills.cmp(&a.kills))
            .then_with(|| a.number.cmp(&b.number))
    });
}

/// Build wire-ready leaderboard entries in rank order.
#[must_use]
pub fn entries(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut ordered = players.to_vec();
    rank(&mut ordered);
    ordered
        .into_iter()
        .map(|p| LeaderboardEntry {
            player_number: p.number,
            address: p.address,
            is_alive: p.is_alive,
            kills: p.kills,
            eliminated_at: p.eliminated_at.map(|t| t.timestamp()),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// WINNERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolved winners, as both addresses (for persistence) and player
/// numbers (for the settlement contract and the wire). A zero slot means
/// the prize position is unfunded or unearned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Winners {
    /// First place.
    pub winner1: WinnerSlot,
    /// Second place (zero when `bps_2nd == 0`).
    pub winner2: WinnerSlot,
    /// Third place (zero when `bps_3rd == 0`).
    pub winner3: WinnerSlot,
    /// Most kills (zero when `bps_kills == 0` or nobody killed).
    pub top_killer: WinnerSlot,
}

/// One winner slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerSlot {
    /// Winner address, or the zero address.
    pub address: WalletAddress,
    /// Winner number, or 0.
    pub number: u16,
}

impl WinnerSlot {
    const EMPTY: Self = Self {
        address: WalletAddress::ZERO,
        number: 0,
    };

    fn from_player(player: &Player) -> Self {
        Self {
            address: player.address,
            number: player.number.get(),
        }
    }

    /// The address when the slot is funded, else `None`.
    #[must_use]
    pub fn address_opt(&self) -> Option<WalletAddress> {
        (!self.address.is_zero()).then_some(self.address)
    }
}

/// Resolve final winners from a single read of the player set.
///
/// `winner1` is the top of the leaderboard order. `winner2` / `winner3`
/// are filled only when their bps slot is funded. `top_killer` is the
/// player (alive or dead) with the most kills, ties broken by the
/// leaderboard order, and only when kills were scored and the slot is
/// funded.
#[must_use]
pub fn resolve_winners(players: &[Player], split: &PrizeSplit) -> Winners {
    let mut ordered = players.to_vec();
    rank(&mut ordered);

    let slot = |idx: usize| ordered.get(idx).map_or(WinnerSlot::EMPTY, WinnerSlot::from_player);

    let winner1 = slot(0);
    let winner2 = if split.bps_2nd > 0 { slot(1) } else { WinnerSlot::EMPTY };
    let winner3 = if split.bps_3rd > 0 { slot(2) } else { WinnerSlot::EMPTY };

    let top_killer = if split.bps_kills > 0 {
        // `ordered` is rank-sorted; replace only on strictly more kills so
        // ties keep the higher-ranked player.
        ordered
            .iter()
            .filter(|p| p.kills > 0)
            .reduce(|best, p| if p.kills > best.kills { p } else { best })
            .map_or(WinnerSlot::EMPTY, WinnerSlot::from_player)
    } else {
        WinnerSlot::EMPTY
    };

    Winners {
        winner1,
        winner2,
        winner3,
        top_killer,
    }
}

/// Look up a player number in a player set (used when mapping contract
/// winner numbers back to addresses).
#[must_use]
pub fn address_of_number(players: &[Player], number: u16) -> Option<WalletAddress> {
    let number = PlayerNumber::new(number).ok()?;
    players
        .iter()
        .find(|p| p.number == number)
        .map(|p| p.address)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
