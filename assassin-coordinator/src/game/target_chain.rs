//! The circular hunter→target relation among alive players.
//!
//! Kept as two mirrored maps (`target_of` and `hunter_of`) so both the
//! forward lookup (who do I hunt) and the reverse lookup (who hunts me)
//! are O(1). Avoids pointer cycles entirely: traversal is by address key.
//!
//! Invariant: whenever at least one edge exists, the edges form exactly
//! one simple cycle over the alive players. With two players the cycle
//! has length 2 (mutual); eliminating down to one player collapses the
//! chain to zero edges.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::types::primitives::WalletAddress;

/// Outcome of a kill against the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Only the hunter remains; the chain is gone.
    Collapsed,
    /// The hunter inherited the victim's target.
    Rewired {
        /// The hunter's new target.
        new_target: WalletAddress,
    },
}

/// Outcome of a forced (non-kill) removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The removed player was not part of the chain (already collapsed).
    NotInChain,
    /// Removal left a single player; the chain is gone.
    Collapsed,
    /// The victim's hunter inherited the victim's target.
    Rewired {
        /// The hunter whose assignment changed.
        hunter: WalletAddress,
        /// Their new target.
        new_target: WalletAddress,
    },
}

/// Error cases for chain mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The hunter's current assignment is not the claimed target.
    #[error("target mismatch: hunter is not assigned to that target")]
    TargetMismatch,
    /// An expected assignment edge is missing (consistency violation).
    #[error("missing assignment for {0}")]
    MissingAssignment(WalletAddress),
}

/// One game's circular hunter→target map.
#[derive(Debug, Default, Clone)]
pub struct TargetChain {
    target_of: HashMap<WalletAddress, WalletAddress>,
    hunter_of: HashMap<WalletAddress, WalletAddress>,
}

impl TargetChain {
    /// Empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain by uniformly shuffling the given alive addresses.
    ///
    /// Uses Fisher–Yates (`SliceRandom::shuffle`) over the thread-local
    /// CSPRNG, then links `addresses[i] → addresses[(i+1) mod n]`.
    /// Requires at least two addresses; fewer yields an empty chain.
    #[must_use]
    pub fn shuffled(mut addresses: Vec<WalletAddress>) -> Self {
        if addresses.len() < 2 {
            return Self::new();
        }
        addresses.shuffle(&mut rand::rng());
        Self::from_cycle(&addresses)
    }

    /// Build a chain from an explicit cycle order (recovery, tests).
    #[must_use]
    pub fn from_cycle(order: &[WalletAddress]) -> Self {
        let mut chain = Self::new();
        if order.len() < 2 {
            return chain;
        }
        for (i, hunter) in order.iter().enumerate() {
            let target = order[(i + 1) % order.len()];
            chain.target_of.insert(*hunter, target);
            chain.hunter_of.insert(target, *hunter);
        }
        chain
    }

    /// Rebuild from persisted `(hunter, target)` edges.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = (WalletAddress, WalletAddress)>) -> Self {
        let mut chain = Self::new();
        for (hunter, target) in edges {
            chain.target_of.insert(hunter, target);
            chain.hunter_of.insert(target, hunter);
        }
        chain
    }

    /// The hunter's current target, if assigned.
    #[must_use]
    pub fn target_of(&self, hunter: WalletAddress) -> Option<WalletAddress> {
        self.target_of.get(&hunter).copied()
    }

    /// The player currently hunting `target`, if any.
    #[must_use]
    pub fn hunter_of(&self, target: WalletAddress) -> Option<WalletAddress> {
        self.hunter_of.get(&target).copied()
    }

    /// Number of edges (equals the number of chained players).
    #[must_use]
    pub fn len(&self) -> usize {
        self.target_of.len()
    }

    /// Whether the chain has collapsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target_of.is_empty()
    }

    /// All `(hunter, target)` edges, sorted by hunter for determinism.
    #[must_use]
    pub fn edges(&self) -> Vec<(WalletAddress, WalletAddress)> {
        let mut edges: Vec<_> = self.target_of.iter().map(|(h, t)| (*h, *t)).collect();
        edges.sort_by_key(|(h, _)| *h);
        edges
    }

    /// Process a kill: the hunter eliminates their assigned target and
    /// inherits the target's target.
    ///
    /// # Errors
    ///
    /// - [`ChainError::TargetMismatch`] if `target` is not the hunter's
    ///   current assignment
    /// - [`ChainError::MissingAssignment`] if the target has no outgoing
    ///   edge (consistency violation; log, do not broadcast)
    pub fn process_kill(
        &mut self,
        hunter: WalletAddress,
        target: WalletAddress,
    ) -> Result<KillOutcome, ChainError> {
        let assigned = self
            .target_of
            .get(&hunter)
            .copied()
            .ok_or(ChainError::MissingAssignment(hunter))?;
        if assigned != target {
            return Err(ChainError::TargetMismatch);
        }

        let inherited = self
            .target_of
            .get(&target)
            .copied()
            .ok_or(ChainError::MissingAssignment(target))?;

        self.target_of.remove(&target);
        self.hunter_of.remove(&inherited);

        if inherited == hunter {
            // Two players were left; the cycle is gone.
            self.target_of.remove(&hunter);
            self.hunter_of.remove(&target);
            return Ok(KillOutcome::Collapsed);
        }

        self.target_of.insert(hunter, inherited);
        self.hunter_of.insert(inherited, hunter);
        self.hunter_of.remove(&target);
        Ok(KillOutcome::Rewired {
            new_target: inherited,
        })
    }

    /// Remove a player for a non-kill elimination (zone, heartbeat,
    /// failed check-in), rewiring their hunter to their ex-target.
    ///
    /// Returns who must be notified: the reassigned hunter and their new
    /// target, if a rewire happened.
    pub fn remove(&mut self, eliminated: WalletAddress) -> RemovalOutcome {
        let Some(ex_target) = self.target_of.get(&eliminated).copied() else {
            return RemovalOutcome::NotInChain;
        };
        let Some(hunter) = self.hunter_of.get(&eliminated).copied() else {
            return RemovalOutcome::NotInChain;
        };

        self.target_of.remove(&eliminated);
        self.hunter_of.remove(&eliminated);
        self.hunter_of.remove(&ex_target);

        if ex_target == hunter {
            // Two players were left; the survivor keeps no assignment.
            self.target_of.remove(&hunter);
            return RemovalOutcome::Collapsed;
        }

        self.target_of.insert(hunter, ex_target);
        self.hunter_of.insert(ex_target, hunter);
        RemovalOutcome::Rewired {
            hunter,
            new_target: ex_target,
        }
    }

    /// Verify the single-cycle invariant (used by tests and recovery).
    #[must_use]
    pub fn is_single_cycle(&self) -> bool {
        if self.target_of.is_empty() {
            return true;
        }
        let Some(start) = self.edges().first().map(|(h, _)| *h) else {
            return false;
        };
        let mut seen = 1_usize;
        let mut current = match self.target_of.get(&start) {
            Some(next) => *next,
            None => return false,
        };
        while current != start {
            seen += 1;
            if seen > self.target_of.len() {
                return false;
            }
            current = match self.target_of.get(&current) {
                Some(next) => *next,
                None => return false,
            };
        }
        seen == self.target_of.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<WalletAddress> {
        (1..=n).map(|i| WalletAddress::new([i; 20])).collect()
    }

    #[test]
    fn shuffled_forms_single_cycle() {
        for n in 2..=12_u8 {
            let chain = TargetChain::shuffled(addrs(n));
            assert_eq!(chain.len(), usize::from(n));
            assert!(chain.is_single_cycle(), "n = {n}");
        }
    }

    #[test]
    fn shuffled_with_one_address_is_empty() {
        assert!(TargetChain::shuffled(addrs(1)).is_empty());
        assert!(TargetChain::shuffled(vec![]).is_empty());
    }

    #[test]
    fn every_player_hunts_exactly_one() {
        let chain = TargetChain::shuffled(addrs(6));
        for a in addrs(6) {
            assert!(chain.target_of(a).is_some());
            assert!(chain.hunter_of(a).is_some());
            assert_ne!(chain.target_of(a), Some(a));
        }
    }

    #[test]
    fn kill_rewires_hunter_to_inherited_target() {
        let order = addrs(4);
        let mut chain = TargetChain::from_cycle(&order);
        // 1→2→3→4→1; 1 kills 2 and inherits 3.
        let outcome = chain.process_kill(order[0], order[1]).unwrap();
        assert_eq!(
            outcome,
            KillOutcome::Rewired {
                new_target: order[2]
            }
        );
        assert_eq!(chain.len(), 3);
        assert!(chain.is_single_cycle());
        assert_eq!(chain.target_of(order[0]), Some(order[2]));
        assert_eq!(chain.hunter_of(order[2]), Some(order[0]));
        assert!(chain.target_of(order[1]).is_none());
    }

    #[test]
    fn kill_with_two_left_collapses() {
        let order = addrs(2);
        let mut chain = TargetChain::from_cycle(&order);
        let outcome = chain.process_kill(order[0], order[1]).unwrap();
        assert_eq!(outcome, KillOutcome::Collapsed);
        assert!(chain.is_empty());
    }

    #[test]
    fn kill_rejects_wrong_target() {
        let order = addrs(4);
        let mut chain = TargetChain::from_cycle(&order);
        // 1's target is 2, not 3.
        assert_eq!(
            chain.process_kill(order[0], order[2]),
            Err(ChainError::TargetMismatch)
        );
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn kill_by_unchained_hunter_is_missing_assignment() {
        let order = addrs(3);
        let mut chain = TargetChain::from_cycle(&order);
        let outsider = WalletAddress::new([99; 20]);
        assert_eq!(
            chain.process_kill(outsider, order[0]),
            Err(ChainError::MissingAssignment(outsider))
        );
    }

    #[test]
    fn remove_rewires_around_the_gap() {
        let order = addrs(5);
        let mut chain = TargetChain::from_cycle(&order);
        // Remove 3: hunter 2 inherits target 4.
        let outcome = chain.remove(order[2]);
        assert_eq!(
            outcome,
            RemovalOutcome::Rewired {
                hunter: order[1],
                new_target: order[3]
            }
        );
        assert_eq!(chain.len(), 4);
        assert!(chain.is_single_cycle());
    }

    #[test]
    fn remove_with_two_left_collapses() {
        let order = addrs(2);
        let mut chain = TargetChain::from_cycle(&order);
        assert_eq!(chain.remove(order[1]), RemovalOutcome::Collapsed);
        assert!(chain.is_empty());
        // Removing again is a no-op.
        assert_eq!(chain.remove(order[0]), RemovalOutcome::NotInChain);
    }

    #[test]
    fn sequential_removals_preserve_cycle() {
        let order = addrs(8);
        let mut chain = TargetChain::from_cycle(&order);
        for victim in &order[..6] {
            chain.remove(*victim);
            assert!(chain.is_single_cycle());
        }
        assert!(chain.is_empty() || chain.len() == 2);
    }

    #[test]
    fn edges_roundtrip_through_from_edges() {
        let chain = TargetChain::shuffled(addrs(6));
        let restored = TargetChain::from_edges(chain.edges());
        assert_eq!(chain.edges(), restored.edges());
        assert!(restored.is_single_cycle());
    }
}
