//! Domain types: validated primitives, lifecycle enums, persistent
//! entities, and the WebSocket wire protocol.

pub mod entities;
pub mod enums;
pub mod messages;
pub mod primitives;

pub use entities::{
    Game, HeartbeatScan, KillRecord, LocationPing, OperatorTx, Player, TargetAssignment,
    ZoneShrink,
};
pub use enums::{EliminationReason, GamePhase, OperatorAction, SubPhase, TxStatus};
pub use messages::{
    ClientMessage, HuntLink, LeaderboardEntry, ServerMessage, SpectatorPlayer, TargetInfo,
    ZoneState,
};
pub use primitives::{BlockNumber, GameId, PlayerNumber, WalletAddress};
