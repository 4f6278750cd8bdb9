//! Domain enums for game lifecycle and the operator outbox.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// GAME PHASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Coarse game lifecycle phase, mirrored from the settlement contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Registration open.
    Registration,
    /// Game running (see [`SubPhase`]).
    Active,
    /// Final result recorded.
    Ended,
    /// Cancelled or expired.
    Cancelled,
}

impl GamePhase {
    /// Stable string used for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "REGISTRATION",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether the game is still running or can still run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GamePhase {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTRATION" => Ok(Self::Registration),
            "ACTIVE" => Ok(Self::Active),
            "ENDED" => Ok(Self::Ended),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(UnknownEnumValue("phase", other.to_owned())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUB-PHASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Finer-grained state within [`GamePhase::Active`].
///
/// Progression is strictly `checkin` → `pregame` → `game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubPhase {
    /// Players prove presence at the meeting point (viral QR scans).
    Checkin,
    /// Countdown between check-in completion and the hunt.
    Pregame,
    /// The hunt itself.
    Game,
}

impl SubPhase {
    /// Stable string used for persistence and wire messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checkin => "checkin",
            Self::Pregame => "pregame",
            Self::Game => "game",
        }
    }
}

impl fmt::Display for SubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubPhase {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkin" => Ok(Self::Checkin),
            "pregame" => Ok(Self::Pregame),
            "game" => Ok(Self::Game),
            other => Err(UnknownEnumValue("sub-phase", other.to_owned())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELIMINATION REASON
// ═══════════════════════════════════════════════════════════════════════════════

/// Reason for a non-kill elimination.
///
/// Kills carry the hunter's address in `eliminated_by` instead; these
/// sentinels cover every other path out of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    /// Never checked in before check-in completed.
    NoCheckin,
    /// Stayed outside the zone past the grace period.
    ZoneViolation,
    /// Missed the heartbeat refresh window.
    HeartbeatTimeout,
}

impl EliminationReason {
    /// Sentinel string stored in `eliminated_by` and sent on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoCheckin => "no_checkin",
            Self::ZoneViolation => "zone_violation",
            Self::HeartbeatTimeout => "heartbeat_timeout",
        }
    }

    /// Contract-side reason code for `eliminatePlayer`.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::NoCheckin => 1,
            Self::ZoneViolation => 2,
            Self::HeartbeatTimeout => 3,
        }
    }
}

impl fmt::Display for EliminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATOR OUTBOX
// ═══════════════════════════════════════════════════════════════════════════════

/// Settlement-contract action recorded in the operator outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperatorAction {
    /// `startGame`
    StartGame,
    /// `recordKill`
    RecordKill,
    /// `eliminatePlayer`
    EliminatePlayer,
    /// `endGame`
    EndGame,
    /// `triggerCancellation`
    TriggerCancellation,
    /// `triggerExpiry`
    TriggerExpiry,
}

impl OperatorAction {
    /// Stable string used for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StartGame => "startGame",
            Self::RecordKill => "recordKill",
            Self::EliminatePlayer => "eliminatePlayer",
            Self::EndGame => "endGame",
            Self::TriggerCancellation => "triggerCancellation",
            Self::TriggerExpiry => "triggerExpiry",
        }
    }
}

impl fmt::Display for OperatorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorAction {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startGame" => Ok(Self::StartGame),
            "recordKill" => Ok(Self::RecordKill),
            "eliminatePlayer" => Ok(Self::EliminatePlayer),
            "endGame" => Ok(Self::EndGame),
            "triggerCancellation" => Ok(Self::TriggerCancellation),
            "triggerExpiry" => Ok(Self::TriggerExpiry),
            other => Err(UnknownEnumValue("operator action", other.to_owned())),
        }
    }
}

/// Status of an operator outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Submitted, awaiting confirmation.
    Pending,
    /// Confirmed on chain.
    Confirmed,
    /// Submission or confirmation failed; not retried automatically.
    Failed,
}

impl TxStatus {
    /// Stable string used for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TxStatus {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownEnumValue("tx status", other.to_owned())),
        }
    }
}

/// Error for enum values read back from persistence.
#[derive(Debug, Clone, Error)]
#[error("unknown {0} value: {1}")]
pub struct UnknownEnumValue(pub &'static str, pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phase_string_roundtrip() {
        for phase in [
            GamePhase::Registration,
            GamePhase::Active,
            GamePhase::Ended,
            GamePhase::Cancelled,
        ] {
            assert_eq!(phase.as_str().parse::<GamePhase>().unwrap(), phase);
        }
        assert!("BOGUS".parse::<GamePhase>().is_err());
    }

    #[test]
    fn sub_phase_string_roundtrip() {
        for sub in [SubPhase::Checkin, SubPhase::Pregame, SubPhase::Game] {
            assert_eq!(sub.as_str().parse::<SubPhase>().unwrap(), sub);
        }
    }

    #[test]
    fn terminal_phases() {
        assert!(GamePhase::Ended.is_terminal());
        assert!(GamePhase::Cancelled.is_terminal());
        assert!(!GamePhase::Active.is_terminal());
        assert!(!GamePhase::Registration.is_terminal());
    }

    #[test]
    fn elimination_reason_codes_are_distinct() {
        let codes = [
            EliminationReason::NoCheckin.code(),
            EliminationReason::ZoneViolation.code(),
            EliminationReason::HeartbeatTimeout.code(),
        ];
        assert_eq!(codes.len(), 3);
        assert!(codes[0] != codes[1] && codes[1] != codes[2] && codes[0] != codes[2]);
    }

    #[test]
    fn operator_action_roundtrip() {
        for action in [
            OperatorAction::StartGame,
            OperatorAction::RecordKill,
            OperatorAction::EliminatePlayer,
            OperatorAction::EndGame,
            OperatorAction::TriggerCancellation,
            OperatorAction::TriggerExpiry,
        ] {
            assert_eq!(action.as_str().parse::<OperatorAction>().unwrap(), action);
        }
    }
}
