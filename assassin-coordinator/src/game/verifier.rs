//! Proof verification for kills and heartbeat scans.
//!
//! Pure functions over a [`GameSnapshot`]: the coordinator loads the
//! game's players, assignments, and latest pings, then asks for a
//! verdict. Checks run in a fixed order and the first failure wins, so
//! a client always sees the most fundamental rejection.
//!
//! Three proof dimensions must agree for a kill: the QR payload (the
//! hunter physically scanned the target's code), GPS (both phones agree
//! they are close), and Bluetooth (the hunter's radio actually saw the
//! target's token) when `ble_required` is on.

use std::collections::HashMap;

use crate::ble;
use crate::config::GameSettings;
use crate::error::VerifyError;
use crate::geo;
use crate::qr;
use crate::types::entities::{LocationPing, Player};
use crate::types::primitives::{GameId, PlayerNumber, WalletAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of one game's verification-relevant state.
#[derive(Debug, Clone, Default)]
pub struct GameSnapshot {
    /// The game the snapshot belongs to.
    pub game_id: GameId,
    /// All players, keyed by number.
    pub players: HashMap<PlayerNumber, Player>,
    /// Current hunter→target edges.
    pub target_of: HashMap<WalletAddress, WalletAddress>,
    /// Latest ping per player.
    pub latest_pings: HashMap<WalletAddress, LocationPing>,
}

impl GameSnapshot {
    /// Build a snapshot from store query results.
    #[must_use]
    pub fn new(
        game_id: GameId,
        players: Vec<Player>,
        edges: Vec<(WalletAddress, WalletAddress)>,
        pings: Vec<LocationPing>,
    ) -> Self {
        Self {
            game_id,
            players: players.into_iter().map(|p| (p.number, p)).collect(),
            target_of: edges.into_iter().collect(),
            latest_pings: pings.into_iter().map(|p| (p.address, p)).collect(),
        }
    }

    /// Look up a player by wallet address.
    #[must_use]
    pub fn player_by_address(&self, address: WalletAddress) -> Option<&Player> {
        self.players.values().find(|p| p.address == address)
    }

    /// Alive player count.
    #[must_use]
    pub fn alive_count(&self) -> u32 {
        u32::try_from(self.players.values().filter(|p| p.is_alive).count()).unwrap_or(u32::MAX)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KILL VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Successful kill verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct KillVerdict {
    /// The verified target.
    pub target: Player,
    /// Measured hunter→target distance, meters.
    pub distance_meters: f64,
    /// Target's last known latitude, degrees.
    pub target_lat: f64,
    /// Target's last known longitude, degrees.
    pub target_lng: f64,
}

/// Verify a kill proof. Ordered checks, first failure wins.
///
/// # Errors
///
/// Returns the first failing check as a [`VerifyError`].
pub fn verify_kill(
    snapshot: &GameSnapshot,
    rules: &GameSettings,
    hunter_address: WalletAddress,
    qr_payload: &str,
    hunter_lat: f64,
    hunter_lng: f64,
    ble_nearby: &[String],
) -> Result<KillVerdict, VerifyError> {
    // 1. QR payload parses and belongs to this game.
    let (game_id, target_number) =
        qr::decode(qr_payload).map_err(|_| VerifyError::InvalidQr)?;
    if game_id != snapshot.game_id {
        return Err(VerifyError::WrongGame);
    }

    // 2. The embedded number resolves to a player.
    let target = snapshot
        .players
        .get(&target_number)
        .ok_or(VerifyError::UnknownPlayer)?;

    // 3. Hunter is registered and alive.
    let hunter = snapshot
        .player_by_address(hunter_address)
        .ok_or(VerifyError::NotRegistered)?;
    if !hunter.is_alive {
        return Err(VerifyError::HunterEliminated);
    }

    // 4. Target is alive.
    if !target.is_alive {
        return Err(VerifyError::TargetAlreadyEliminated);
    }

    // 5. The scanned player is the hunter's current assignment.
    if snapshot.target_of.get(&hunter_address).copied() != Some(target.address) {
        return Err(VerifyError::NotYourTarget);
    }

    // 6. GPS proximity against the target's last known position.
    let target_ping = snapshot
        .latest_pings
        .get(&target.address)
        .ok_or(VerifyError::TargetLocationUnavailable)?;
    let distance_meters =
        geo::haversine_meters(hunter_lat, hunter_lng, target_ping.lat, target_ping.lng);
    if distance_meters > rules.kill_proximity_meters {
        return Err(VerifyError::TooFar { distance_meters });
    }

    // 7. Bluetooth proof.
    if rules.ble_required {
        check_ble(target, ble_nearby)?;
    }

    Ok(KillVerdict {
        target: target.clone(),
        distance_meters,
        target_lat: target_ping.lat,
        target_lng: target_ping.lng,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEARTBEAT VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Successful heartbeat verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatVerdict {
    /// The player whose liveness gets refreshed.
    pub scanned: Player,
}

/// Verify a heartbeat scan proof.
///
/// The scanned player must be neither the scanner's target nor the
/// scanner's hunter: the hunter–target pair proves liveness through
/// kills, not heartbeats.
///
/// # Errors
///
/// Returns the first failing check as a [`VerifyError`].
pub fn verify_heartbeat(
    snapshot: &GameSnapshot,
    rules: &GameSettings,
    scanner_address: WalletAddress,
    qr_payload: &str,
    scanner_lat: f64,
    scanner_lng: f64,
    ble_nearby: &[String],
) -> Result<HeartbeatVerdict, VerifyError> {
    // Enforcement stops once few players remain.
    if snapshot.alive_count() <= rules.heartbeat_disable_threshold {
        return Err(VerifyError::HeartbeatDisabled);
    }

    let scanner = snapshot
        .player_by_address(scanner_address)
        .ok_or(VerifyError::NotRegistered)?;
    if !scanner.is_alive {
        return Err(VerifyError::HunterEliminated);
    }

    let (game_id, scanned_number) =
        qr::decode(qr_payload).map_err(|_| VerifyError::InvalidQr)?;
    if game_id != snapshot.game_id {
        return Err(VerifyError::WrongGame);
    }

    let scanned = snapshot
        .players
        .get(&scanned_number)
        .ok_or(VerifyError::UnknownPlayer)?;
    if !scanned.is_alive {
        return Err(VerifyError::TargetAlreadyEliminated);
    }

    if scanned.address == scanner_address {
        return Err(VerifyError::ScanYourself);
    }
    if snapshot.target_of.get(&scanner_address).copied() == Some(scanned.address) {
        return Err(VerifyError::ScanYourTarget);
    }
    if snapshot.target_of.get(&scanned.address).copied() == Some(scanner_address) {
        return Err(VerifyError::ScanYourHunter);
    }

    let scanned_ping = snapshot
        .latest_pings
        .get(&scanned.address)
        .ok_or(VerifyError::TargetLocationUnavailable)?;
    let distance_meters =
        geo::haversine_meters(scanner_lat, scanner_lng, scanned_ping.lat, scanned_ping.lng);
    if distance_meters > rules.heartbeat_proximity_meters {
        return Err(VerifyError::TooFar { distance_meters });
    }

    if rules.ble_required {
        check_ble(scanned, ble_nearby)?;
    }

    Ok(HeartbeatVerdict {
        scanned: scanned.clone(),
    })
}

/// Shared Bluetooth proof: the scanned player's stored token must appear
/// among the tokens the submitter reports nearby.
fn check_ble(target: &Player, ble_nearby: &[String]) -> Result<(), VerifyError> {
    let token = target
        .bluetooth_token
        .as_deref()
        .ok_or(VerifyError::TargetBluetoothMissing)?;
    if !ble::matches_any(token, ble_nearby) {
        return Err(VerifyError::NotSeenOverBluetooth);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
