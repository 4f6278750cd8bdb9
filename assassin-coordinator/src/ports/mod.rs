//! Port traits decoupling the coordinator core from infrastructure.

pub mod clock;
pub mod store;

pub use clock::{Clock, FakeClock, SystemClock};
pub use store::{
    AssignmentStore, CursorStore, GameStore, HeartbeatStore, KillStore, LocationStore,
    OutboxStore, PlayerStore, Store,
};
