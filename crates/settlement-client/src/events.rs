//! Decoded settlement-contract events.
//!
//! Raw logs are decoded into [`ChainEvent`] values using the event signature
//! (topic0), mirroring how the contract's seven events map onto coordinator
//! handlers. Unknown signatures decode to `None` and are skipped by the
//! consumer.

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;

use crate::abi::ChainAssassin;
use crate::error::{Result, SettlementError};

/// A decoded settlement-contract event, in coordinator-facing shape.
///
/// Player numbers are `u16` (the contract caps games at 10 000 players);
/// game ids are `u64` (monotonically increasing, far below `U256` range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A creator opened a new game.
    GameCreated {
        /// The new game's id.
        game_id: u64,
        /// The creator's wallet address.
        creator: Address,
    },
    /// A player paid the entry fee and registered.
    PlayerRegistered {
        /// Game the player registered for.
        game_id: u64,
        /// The player's wallet address.
        player: Address,
        /// 1-based sequential registration index.
        player_number: u16,
        /// Escrow total after this registration (wei).
        total_collected: U256,
    },
    /// The operator started the game; check-in opens.
    GameStarted {
        /// The started game.
        game_id: u64,
        /// Registered player count at start.
        player_count: u32,
    },
    /// The operator submitted the final result.
    GameEnded {
        /// The ended game.
        game_id: u64,
        /// First-place player number.
        winner1: u16,
        /// Second-place player number (0 if unfunded).
        winner2: u16,
        /// Third-place player number (0 if unfunded).
        winner3: u16,
        /// Top-killer player number (0 if unfunded or no kills).
        top_killer: u16,
    },
    /// The game was cancelled (under-subscription) or expired.
    GameCancelled {
        /// The cancelled game.
        game_id: u64,
        /// Contract-side reason code.
        reason: u8,
    },
    /// A winner pulled their prize.
    PrizeClaimed {
        /// The game the prize belongs to.
        game_id: u64,
        /// The claiming player.
        player: Address,
        /// Claimed amount (wei).
        amount: U256,
    },
    /// A refunded player pulled their entry fee back.
    RefundClaimed {
        /// The cancelled game.
        game_id: u64,
        /// The claiming player.
        player: Address,
        /// Refunded amount (wei).
        amount: U256,
    },
}

impl ChainEvent {
    /// The game this event belongs to.
    #[must_use]
    pub const fn game_id(&self) -> u64 {
        match self {
            Self::GameCreated { game_id, .. }
            | Self::PlayerRegistered { game_id, .. }
            | Self::GameStarted { game_id, .. }
            | Self::GameEnded { game_id, .. }
            | Self::GameCancelled { game_id, .. }
            | Self::PrizeClaimed { game_id, .. }
            | Self::RefundClaimed { game_id, .. } => *game_id,
        }
    }

    /// Decode a raw log into a [`ChainEvent`].
    ///
    /// Returns `Ok(None)` for logs that are not settlement-contract events
    /// (unknown topic0 or no topics at all).
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Decode`] if the log carries a known
    /// signature but malformed data.
    pub fn decode_log(log: &Log) -> Result<Option<Self>> {
        let Some(topic0) = log.topics().first() else {
            return Ok(None);
        };

        let event = match topic0.as_slice() {
            x if x == ChainAssassin::GameCreated::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::GameCreated>(log)?;
                Self::GameCreated {
                    game_id: game_id_from(ev.gameId)?,
                    creator: ev.creator,
                }
            }
            x if x == ChainAssassin::PlayerRegistered::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::PlayerRegistered>(log)?;
                Self::PlayerRegistered {
                    game_id: game_id_from(ev.gameId)?,
                    player: ev.player,
                    player_number: ev.playerNumber,
                    total_collected: ev.totalCollected,
                }
            }
            x if x == ChainAssassin::GameStarted::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::GameStarted>(log)?;
                Self::GameStarted {
                    game_id: game_id_from(ev.gameId)?,
                    player_count: ev.playerCount,
                }
            }
            x if x == ChainAssassin::GameEnded::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::GameEnded>(log)?;
                Self::GameEnded {
                    game_id: game_id_from(ev.gameId)?,
                    winner1: ev.winner1,
                    winner2: ev.winner2,
                    winner3: ev.winner3,
                    top_killer: ev.topKiller,
                }
            }
            x if x == ChainAssassin::GameCancelled::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::GameCancelled>(log)?;
                Self::GameCancelled {
                    game_id: game_id_from(ev.gameId)?,
                    reason: ev.reason,
                }
            }
            x if x == ChainAssassin::PrizeClaimed::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::PrizeClaimed>(log)?;
                Self::PrizeClaimed {
                    game_id: game_id_from(ev.gameId)?,
                    player: ev.player,
                    amount: ev.amount,
                }
            }
            x if x == ChainAssassin::RefundClaimed::SIGNATURE_HASH.as_slice() => {
                let ev = decode::<ChainAssassin::RefundClaimed>(log)?;
                Self::RefundClaimed {
                    game_id: game_id_from(ev.gameId)?,
                    player: ev.player,
                    amount: ev.amount,
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

/// Decode a log into a strongly-typed event.
fn decode<Ev: SolEvent>(log: &Log) -> Result<Ev> {
    let decoded = Ev::decode_log(&log.inner)
        .map_err(|e| SettlementError::Decode(format!("failed to decode {}: {e}", Ev::SIGNATURE)))?;
    Ok(decoded.data)
}

/// Narrow a `U256` game id into `u64`.
fn game_id_from(raw: U256) -> Result<u64> {
    u64::try_from(raw).map_err(|_| SettlementError::Decode(format!("game id out of range: {raw}")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy::primitives::{B256, Bytes, LogData};
    use alloy::rpc::types::Log;

    use super::*;

    fn raw_log(topics: Vec<B256>, data: Bytes) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new(topics, data).unwrap(),
            },
            block_hash: Some(B256::ZERO),
            block_number: Some(1),
            block_timestamp: None,
            transaction_hash: Some(B256::ZERO),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[test]
    fn no_topics_decodes_to_none() {
        let log = raw_log(vec![], Bytes::new());
        assert_eq!(ChainEvent::decode_log(&log).unwrap(), None);
    }

    #[test]
    fn unknown_signature_decodes_to_none() {
        let log = raw_log(vec![B256::repeat_byte(0xFF)], Bytes::new());
        assert_eq!(ChainEvent::decode_log(&log).unwrap(), None);
    }

    #[test]
    fn game_created_roundtrip() {
        use alloy::sol_types::SolEvent;

        let creator = Address::repeat_byte(0x11);
        let ev = ChainAssassin::GameCreated {
            gameId: U256::from(7),
            creator,
        };
        let encoded = ev.encode_log_data();
        let log = raw_log(encoded.topics().to_vec(), encoded.data.clone());

        let decoded = ChainEvent::decode_log(&log).unwrap().unwrap();
        assert_eq!(
            decoded,
            ChainEvent::GameCreated {
                game_id: 7,
                creator
            }
        );
        assert_eq!(decoded.game_id(), 7);
    }

    #[test]
    fn player_registered_roundtrip() {
        use alloy::sol_types::SolEvent;

        let player = Address::repeat_byte(0x22);
        let ev = ChainAssassin::PlayerRegistered {
            gameId: U256::from(3),
            player,
            playerNumber: 4,
            totalCollected: U256::from(40_000_000_000_000_000_u128),
        };
        let encoded = ev.encode_log_data();
        let log = raw_log(encoded.topics().to_vec(), encoded.data.clone());

        let decoded = ChainEvent::decode_log(&log).unwrap().unwrap();
        assert_eq!(
            decoded,
            ChainEvent::PlayerRegistered {
                game_id: 3,
                player,
                player_number: 4,
                total_collected: U256::from(40_000_000_000_000_000_u128),
            }
        );
    }
}
