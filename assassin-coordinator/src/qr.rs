//! Obfuscated QR payload codec.
//!
//! Every scan in the game (check-in, kill, heartbeat) presents a numeric
//! payload encoding `(gameId, playerNumber)`. The obfuscation is a fixed
//! modular multiplication; it hides the raw tuple from casual inspection
//! but is not a security boundary. This codec is the shared contract
//! between clients and the coordinator and must not change.
//!
//! Encoding: `n = gameId * 10000 + playerNumber`, payload =
//! `(n * 1_588_635_695) mod 2_147_483_647`. Decoding multiplies by the
//! multiplier's modular inverse. The modulus is the Mersenne prime 2³¹−1,
//! so the map is a bijection on `[0, 2³¹−1)`; round-trip identity therefore
//! requires `n` below the modulus (gameId ≤ 214 748).

use thiserror::Error;

use crate::types::primitives::{GameId, PlayerNumber};

/// Obfuscation multiplier (coprime to the modulus).
const MULTIPLIER: u64 = 1_588_635_695;

/// Modular inverse of [`MULTIPLIER`] modulo [`MODULUS`].
const MULTIPLIER_INVERSE: u64 = 1_799_631_288;

/// The Mersenne prime 2³¹ − 1.
const MODULUS: u64 = 2_147_483_647;

/// Player numbers occupy the low four decimal digits of `n`.
const PLAYER_FIELD: u64 = 10_000;

/// Error for payloads that do not decode to a valid `(game, player)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed QR payload")]
pub struct InvalidPayload;

/// Encode a `(gameId, playerNumber)` tuple into a payload string.
#[must_use]
pub fn encode(game_id: GameId, number: PlayerNumber) -> String {
    let n = u128::from(game_id.get()) * u128::from(PLAYER_FIELD) + u128::from(number.get());
    let obfuscated = (n * u128::from(MULTIPLIER)) % u128::from(MODULUS);
    obfuscated.to_string()
}

/// Decode a payload string back into its `(gameId, playerNumber)` tuple.
///
/// A payload is valid iff it is a decimal number below the modulus and both
/// decoded fields are positive.
///
/// # Errors
///
/// Returns [`InvalidPayload`] for non-numeric input, values at or above the
/// modulus, or tuples with a zero field.
pub fn decode(payload: &str) -> Result<(GameId, PlayerNumber), InvalidPayload> {
    let value: u64 = payload.parse().map_err(|_| InvalidPayload)?;
    if value >= MODULUS {
        return Err(InvalidPayload);
    }

    let n = (u128::from(value) * u128::from(MULTIPLIER_INVERSE)) % u128::from(MODULUS);
    let game = n / u128::from(PLAYER_FIELD);
    let player = n % u128::from(PLAYER_FIELD);

    if game == 0 || player == 0 {
        return Err(InvalidPayload);
    }

    #[allow(clippy::cast_possible_truncation)]
    let number = PlayerNumber::new(player as u16).map_err(|_| InvalidPayload)?;
    #[allow(clippy::cast_possible_truncation)]
    Ok((GameId::new(game as u64), number))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
