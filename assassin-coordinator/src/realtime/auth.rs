//! Signed-message authentication for WebSocket and REST clients.
//!
//! Clients sign a short, timestamped message with their wallet key
//! (EIP-191 personal-sign); the coordinator recovers the signer and
//! matches it against the claimed address. The timestamp bounds replay:
//! a captured signature goes stale after the skew window.
//!
//! Message formats:
//! - WebSocket player auth: `"chain-assassin:{gameId}:{timestamp}"`
//! - REST signed headers:   `"chain-assassin:{timestamp}"`

use std::str::FromStr;

use alloy::primitives::Signature;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::primitives::{GameId, WalletAddress};

/// Accepted clock skew between client and coordinator, seconds.
pub const AUTH_SKEW_SECONDS: i64 = 300;

/// Message prefix shared by both auth flavors.
const MESSAGE_PREFIX: &str = "chain-assassin:";

/// Authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The message does not match the expected format.
    #[error("malformed auth message")]
    MalformedMessage,
    /// The message embeds a different game id.
    #[error("auth message is for another game")]
    WrongGame,
    /// The timestamp is outside the skew window.
    #[error("auth message timestamp out of range")]
    StaleTimestamp,
    /// The signature does not parse or recover.
    #[error("invalid signature")]
    BadSignature,
    /// The recovered signer differs from the claimed address.
    #[error("signature does not match address")]
    AddressMismatch,
}

fn check_timestamp(timestamp: i64, now: DateTime<Utc>) -> Result<(), AuthError> {
    if (now.timestamp() - timestamp).abs() > AUTH_SKEW_SECONDS {
        return Err(AuthError::StaleTimestamp);
    }
    Ok(())
}

fn recover_signer(message: &str, signature: &str) -> Result<WalletAddress, AuthError> {
    let signature = Signature::from_str(signature).map_err(|_| AuthError::BadSignature)?;
    let recovered = signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| AuthError::BadSignature)?;
    Ok(recovered.into())
}

/// Verify a WebSocket player-room auth message.
///
/// # Errors
///
/// Returns an [`AuthError`] describing the first failed check.
pub fn verify_player_auth(
    game_id: GameId,
    address: WalletAddress,
    signature: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let rest = message
        .strip_prefix(MESSAGE_PREFIX)
        .ok_or(AuthError::MalformedMessage)?;
    let (game_part, ts_part) = rest.split_once(':').ok_or(AuthError::MalformedMessage)?;

    let claimed_game: u64 = game_part.parse().map_err(|_| AuthError::MalformedMessage)?;
    if claimed_game != game_id.get() {
        return Err(AuthError::WrongGame);
    }

    let timestamp: i64 = ts_part.parse().map_err(|_| AuthError::MalformedMessage)?;
    check_timestamp(timestamp, now)?;

    let recovered = recover_signer(message, signature)?;
    if recovered != address {
        return Err(AuthError::AddressMismatch);
    }
    Ok(())
}

/// Verify a REST signed-request header triple, returning the caller.
///
/// # Errors
///
/// Returns an [`AuthError`] describing the first failed check.
pub fn verify_request_auth(
    address: WalletAddress,
    signature: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<WalletAddress, AuthError> {
    let ts_part = message
        .strip_prefix(MESSAGE_PREFIX)
        .ok_or(AuthError::MalformedMessage)?;
    let timestamp: i64 = ts_part.parse().map_err(|_| AuthError::MalformedMessage)?;
    check_timestamp(timestamp, now)?;

    let recovered = recover_signer(message, signature)?;
    if recovered != address {
        return Err(AuthError::AddressMismatch);
    }
    Ok(recovered)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
