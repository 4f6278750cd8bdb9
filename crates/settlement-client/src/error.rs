//! Error types for the settlement contract client.

use thiserror::Error;

/// Result type alias using [`SettlementError`].
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Errors that can occur when talking to the settlement contract.
///
/// # Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Network  | `Connection`, `Rpc` | Endpoint unreachable, node error |
/// | Protocol | `Reverted`, `ConfirmationTimeout` | Contract rejected the call |
/// | Data     | `Decode` | Malformed log or return data |
/// | Usage    | `InvalidConfig` | Bad URL or key material |
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettlementError {
    /// Failed to establish connection to the RPC endpoint.
    #[error("connection failed: {0}")]
    Connection(String),

    /// JSON-RPC or transport error from the node.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The transaction was mined but reverted, or the call itself reverted.
    #[error("contract call reverted: {0}")]
    Reverted(String),

    /// Gave up waiting for a transaction to confirm.
    #[error("transaction not confirmed within the deadline")]
    ConfirmationTimeout,

    /// Failed to decode a log or a view return value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid client configuration (URL, operator key).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
