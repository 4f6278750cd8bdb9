//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a player number as a game id)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte wallet address.
///
/// Use `Address` from `alloy-primitives` for on-chain interaction, but this
/// type for persistence, domain logic, and wire messages (serializes as
/// lowercase 0x-hex).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress([u8; 20]);

impl WalletAddress {
    /// The zero address (0x0000...0000), used for unfunded winner slots.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidAddress> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(InvalidAddress::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidAddress::InvalidHex)?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| InvalidAddress::WrongLength(0))?;
        Ok(Self(bytes))
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletAddress({})", self.to_hex())
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for WalletAddress {
    type Error = InvalidAddress;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

impl From<Address> for WalletAddress {
    fn from(addr: Address) -> Self {
        Self::new(addr.0.0)
    }
}

impl From<WalletAddress> for Address {
    fn from(addr: WalletAddress) -> Self {
        Self::from(addr.0)
    }
}

/// Error for invalid wallet addresses.
#[derive(Debug, Clone, Error)]
pub enum InvalidAddress {
    /// Address has wrong byte length.
    #[error("wrong length: expected 20 bytes, got {0}")]
    WrongLength(usize),
    /// Address contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAME ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Game identifier, originated by the settlement contract.
///
/// Monotonically increasing, starting at 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(u64);

impl GameId {
    /// Create a new game id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for GameId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<GameId> for u64 {
    fn from(id: GameId) -> Self {
        id.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYER NUMBER
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based sequential per-game player number.
///
/// Assigned in registration order, never reused. This is the unit used in
/// QR payloads, WebSocket messages, and contract events; it maps 1:1 to a
/// wallet address within a game. Bounded below 10 000 by the QR codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerNumber(u16);

impl PlayerNumber {
    /// Create a player number.
    ///
    /// # Errors
    /// Returns `InvalidPlayerNumber` if the value is 0 or ≥ 10 000.
    pub const fn new(value: u16) -> Result<Self, InvalidPlayerNumber> {
        if value == 0 || value >= 10_000 {
            return Err(InvalidPlayerNumber(value));
        }
        Ok(Self(value))
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for PlayerNumber {
    type Error = InvalidPlayerNumber;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlayerNumber> for u16 {
    fn from(n: PlayerNumber) -> Self {
        n.0
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for invalid player numbers.
#[derive(Debug, Clone, Copy, Error)]
#[error("player number out of range: {0}")]
pub struct InvalidPlayerNumber(pub u16);

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER (for type clarity)
// ═══════════════════════════════════════════════════════════════════════════════

/// Block number newtype for clarity in the sync cursor plumbing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the next block number (saturating at `u64::MAX`).
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(b: BlockNumber) -> Self {
        b.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod wallet_address_tests {
        use super::*;

        #[test]
        fn from_hex_with_prefix() {
            let addr = WalletAddress::from_hex("0x1234567890123456789012345678901234567890").unwrap();
            assert_eq!(addr.to_hex(), "0x1234567890123456789012345678901234567890");
        }

        #[test]
        fn from_hex_without_prefix() {
            let addr = WalletAddress::from_hex("1234567890123456789012345678901234567890").unwrap();
            assert_eq!(addr.to_hex(), "0x1234567890123456789012345678901234567890");
        }

        #[test]
        fn from_hex_wrong_length() {
            assert!(WalletAddress::from_hex("0x1234").is_err());
        }

        #[test]
        fn from_hex_invalid_chars() {
            assert!(
                WalletAddress::from_hex("0xgggggggggggggggggggggggggggggggggggggggg").is_err()
            );
        }

        #[test]
        fn zero_address() {
            assert!(WalletAddress::ZERO.is_zero());
            assert_eq!(
                WalletAddress::ZERO.to_hex(),
                "0x0000000000000000000000000000000000000000"
            );
        }

        #[test]
        fn alloy_address_roundtrip() {
            let addr = WalletAddress::from_hex("0x1234567890123456789012345678901234567890").unwrap();
            let alloy_addr: Address = addr.into();
            let back: WalletAddress = alloy_addr.into();
            assert_eq!(addr, back);
        }

        #[test]
        fn ordering_is_bytewise() {
            let a = WalletAddress::new([1; 20]);
            let b = WalletAddress::new([2; 20]);
            assert!(a < b);
        }
    }

    mod player_number_tests {
        use super::*;

        #[test]
        fn one_is_valid() {
            assert_eq!(PlayerNumber::new(1).unwrap().get(), 1);
        }

        #[test]
        fn zero_is_invalid() {
            assert!(PlayerNumber::new(0).is_err());
        }

        #[test]
        fn ten_thousand_is_invalid() {
            assert!(PlayerNumber::new(10_000).is_err());
            assert!(PlayerNumber::new(9_999).is_ok());
        }
    }

    mod block_number_tests {
        use super::*;

        #[test]
        fn next() {
            assert_eq!(BlockNumber::new(100).next().get(), 101);
        }
    }
}
