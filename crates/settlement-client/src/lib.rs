//! Typed client for the chain-assassin settlement contract.
//!
//! The coordinator's entire on-chain surface lives here:
//!
//! - [`abi`] - `sol!` bindings for the contract's events, views, and
//!   operator functions
//! - [`events`] - decoded [`ChainEvent`] values the coordinator consumes
//! - [`traits`] - the [`SettlementReader`] / [`SettlementOperator`] ports
//! - [`client`] - alloy-backed implementation over an HTTP provider with
//!   a wallet signer
//! - [`simulated`] - in-memory test double (feature `test-utils`)
//!
//! The operator surface is deliberately narrow: `startGame`, `recordKill`,
//! `eliminatePlayer`, `endGame`, `triggerCancellation`, `triggerExpiry`.
//! Everything else the contract does (escrow, claims, refunds) happens
//! between players and the contract directly.

pub mod abi;
pub mod client;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "test-utils"))]
pub mod simulated;
pub mod traits;

pub use client::SettlementClient;
pub use error::{Result, SettlementError};
pub use events::ChainEvent;
#[cfg(any(test, feature = "test-utils"))]
pub use simulated::{OperatorCall, SimulatedSettlement};
pub use traits::{
    GameSetup, OnchainGame, OnchainPhase, PrizeSplit, SettlementOperator, SettlementReader,
    ZoneShrinkSpec,
};
