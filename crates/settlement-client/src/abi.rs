//! ABI bindings for the ChainAssassin settlement contract.
//!
//! The settlement contract owns game creation, registration escrow, and
//! payouts. The coordinator only ever touches the narrow operator surface
//! plus two read-only views; everything else (claiming, refunds, fee
//! routing) happens directly between players and the contract.
//!
//! # Solidity Contract
//!
//! ```solidity
//! contract ChainAssassin {
//!     event GameCreated(uint256 indexed gameId, address indexed creator);
//!     event PlayerRegistered(uint256 indexed gameId, address indexed player, uint16 playerNumber, uint256 totalCollected);
//!     event GameStarted(uint256 indexed gameId, uint32 playerCount);
//!     event GameEnded(uint256 indexed gameId, uint16 winner1, uint16 winner2, uint16 winner3, uint16 topKiller);
//!     event GameCancelled(uint256 indexed gameId, uint8 reason);
//!     event PrizeClaimed(uint256 indexed gameId, address indexed player, uint256 amount);
//!     event RefundClaimed(uint256 indexed gameId, address indexed player, uint256 amount);
//!     // ... operator functions, views
//! }
//! ```

use alloy::sol;

sol! {
    /// Full game configuration as stored by the settlement contract.
    ///
    /// Coordinates are fixed-point degrees scaled by 10^6. A meeting point
    /// of `(0, 0)` means "unset" (fall back to the zone center).
    #[derive(Debug, PartialEq, Eq)]
    struct GameConfig {
        string title;
        uint256 entryFee;
        uint32 minPlayers;
        uint32 maxPlayers;
        uint64 registrationDeadline;
        uint64 gameDate;
        uint64 expiryDeadline;
        uint64 maxDuration;
        int32 zoneCenterLat;
        int32 zoneCenterLng;
        int32 meetingLat;
        int32 meetingLng;
        uint16 bps1st;
        uint16 bps2nd;
        uint16 bps3rd;
        uint16 bpsKills;
        uint16 bpsCreator;
    }

    #[sol(rpc)]
    contract ChainAssassin {
        // ═══════════════════════════════════════════════════════════════════
        // EVENTS
        // ═══════════════════════════════════════════════════════════════════

        /// Emitted when a creator opens a new game.
        #[derive(Debug, PartialEq, Eq)]
        event GameCreated(uint256 indexed gameId, address indexed creator);

        /// Emitted when a player pays the entry fee and registers.
        ///
        /// `playerNumber` is the 1-based sequential registration index;
        /// it is never reused within a game.
        #[derive(Debug, PartialEq, Eq)]
        event PlayerRegistered(
            uint256 indexed gameId,
            address indexed player,
            uint16 playerNumber,
            uint256 totalCollected
        );

        /// Emitted when the operator starts the game (check-in opens).
        #[derive(Debug, PartialEq, Eq)]
        event GameStarted(uint256 indexed gameId, uint32 playerCount);

        /// Emitted when the operator submits the final result.
        ///
        /// Winners are player numbers; `0` means the slot is unfunded.
        #[derive(Debug, PartialEq, Eq)]
        event GameEnded(
            uint256 indexed gameId,
            uint16 winner1,
            uint16 winner2,
            uint16 winner3,
            uint16 topKiller
        );

        /// Emitted on cancellation (under-subscription) or expiry.
        #[derive(Debug, PartialEq, Eq)]
        event GameCancelled(uint256 indexed gameId, uint8 reason);

        /// Emitted when a winner pulls their prize.
        #[derive(Debug, PartialEq, Eq)]
        event PrizeClaimed(uint256 indexed gameId, address indexed player, uint256 amount);

        /// Emitted when a refunded player pulls their entry fee back.
        #[derive(Debug, PartialEq, Eq)]
        event RefundClaimed(uint256 indexed gameId, address indexed player, uint256 amount);

        // ═══════════════════════════════════════════════════════════════════
        // VIEWS
        // ═══════════════════════════════════════════════════════════════════

        /// Read a game's configuration and live state.
        function getGame(uint256 gameId)
            external
            view
            returns (GameConfig memory config, uint8 phase, uint32 playerCount, uint256 totalCollected);

        /// Read a game's zone shrink schedule (parallel arrays, ordered).
        function getZoneShrinks(uint256 gameId)
            external
            view
            returns (uint32[] memory atSeconds, uint32[] memory radiiMeters);

        // ═══════════════════════════════════════════════════════════════════
        // OPERATOR API
        // ═══════════════════════════════════════════════════════════════════

        /// Transition a subscribed game into the active phase.
        function startGame(uint256 gameId) external;

        /// Record a verified kill (hunter and target as player numbers).
        function recordKill(uint256 gameId, uint16 hunterNumber, uint16 targetNumber) external;

        /// Eliminate a player for a non-kill reason (zone, heartbeat, check-in).
        function eliminatePlayer(uint256 gameId, uint16 playerNumber, uint8 reason) external;

        /// Submit the final result and unlock payouts.
        function endGame(
            uint256 gameId,
            uint16 winner1,
            uint16 winner2,
            uint16 winner3,
            uint16 topKiller
        ) external;

        /// Cancel an under-subscribed game and unlock refunds.
        function triggerCancellation(uint256 gameId) external;

        /// Expire a game whose check-in never completed.
        function triggerExpiry(uint256 gameId) external;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolEvent;

    use super::*;

    #[test]
    fn event_signatures_are_distinct() {
        let sigs = [
            ChainAssassin::GameCreated::SIGNATURE_HASH,
            ChainAssassin::PlayerRegistered::SIGNATURE_HASH,
            ChainAssassin::GameStarted::SIGNATURE_HASH,
            ChainAssassin::GameEnded::SIGNATURE_HASH,
            ChainAssassin::GameCancelled::SIGNATURE_HASH,
            ChainAssassin::PrizeClaimed::SIGNATURE_HASH,
            ChainAssassin::RefundClaimed::SIGNATURE_HASH,
        ];
        for (i, a) in sigs.iter().enumerate() {
            for b in sigs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
