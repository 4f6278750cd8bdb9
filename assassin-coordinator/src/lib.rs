//! Chain Assassin game coordinator.
//!
//! The authoritative real-time coordinator for a location-based,
//! on-chain-settled elimination game. Players register and pay an entry
//! fee to an external settlement contract; at the scheduled time the
//! coordinator drives them through a check-in ritual, assigns a circular
//! target chain, and referees a hunt in which each player must physically
//! find and scan their assigned target's QR code while staying inside a
//! shrinking geo-zone. When the game ends, the coordinator decides the
//! winners and reports them back to the settlement contract for payout.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        COORDINATOR CORE                          │
//! │  ┌────────────┐   ┌──────────────┐   ┌────────────────────────┐  │
//! │  │   Chain    │──▶│ Coordinator  │──▶│  Realtime fan-out      │  │
//! │  │   Adapter  │   │ (state       │   │  (player + spectator   │  │
//! │  └────────────┘   │  machine,    │   │   rooms)               │  │
//! │  ┌────────────┐   │  timers)     │   └────────────────────────┘  │
//! │  │  REST/WS   │──▶│              │──▶ operator outbox ──▶ chain  │
//! │  │  API       │   └──────┬───────┘                               │
//! │  └────────────┘          ▼                                       │
//! │                    ┌──────────┐                                  │
//! │                    │  Store   │  (SQLite)                        │
//! │                    └──────────┘                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (primitives, enums, entities, wire protocol)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`geo`] / [`qr`] / [`ble`] - Proof-dimension utilities
//! - [`ports`] - Store and clock port traits
//! - [`store`] - SQLite and in-memory store adapters
//! - [`game`] - Target chain, zone tracker, verifiers, leaderboard,
//!   coordinator
//! - [`realtime`] - WebSocket rooms and signed-message auth
//! - [`chain`] - Chain event adapter
//! - [`api`] - REST and WebSocket API

pub mod api;
pub mod ble;
pub mod chain;
pub mod config;
pub mod error;
pub mod game;
pub mod geo;
pub mod ports;
pub mod qr;
pub mod realtime;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
