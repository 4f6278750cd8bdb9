//! Per-game evolving zone disk and out-of-zone grace tracking.
//!
//! The zone is a disk around a fixed center whose radius steps down
//! according to the game's shrink schedule. A player caught outside gets
//! a grace countdown; staying outside past the grace period marks them
//! expired and the coordinator eliminates them on the next tick.
//!
//! On recovery the coordinator reseeds [`ZoneTracker::process_location`]
//! with each alive player's most recent persisted ping using that ping's
//! original timestamp, so grace countdowns continue monotonically across
//! restarts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::geo;
use crate::types::entities::ZoneShrink;
use crate::types::messages::ZoneState;
use crate::types::primitives::WalletAddress;

/// Verdict for one processed location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationVerdict {
    /// Whether the point is inside the current zone radius.
    pub in_zone: bool,
    /// Remaining grace seconds, when outside.
    pub seconds_remaining: Option<u64>,
}

/// Per-game zone state machine.
#[derive(Debug, Clone)]
pub struct ZoneTracker {
    center_lat: f64,
    center_lng: f64,
    /// Shrink schedule ordered by `at_second`; index 0 is the initial radius.
    shrinks: Vec<ZoneShrink>,
    /// When sub-phase `game` began.
    started_at: DateTime<Utc>,
    grace_seconds: u64,
    /// Index of the shrink currently in force.
    shrink_idx: usize,
    /// Players currently outside, keyed to when they left the zone.
    out_of_zone: HashMap<WalletAddress, DateTime<Utc>>,
}

impl ZoneTracker {
    /// Build a tracker from a game's persisted schedule.
    ///
    /// `center` is in micro-degrees as stored by the contract.
    #[must_use]
    pub fn new(
        center: (i32, i32),
        mut shrinks: Vec<ZoneShrink>,
        started_at: DateTime<Utc>,
        grace_seconds: u64,
    ) -> Self {
        shrinks.sort_by_key(|s| s.at_second);
        Self {
            center_lat: geo::micro_to_degrees(center.0),
            center_lng: geo::micro_to_degrees(center.1),
            shrinks,
            started_at,
            grace_seconds,
            shrink_idx: 0,
            out_of_zone: HashMap::new(),
        }
    }

    fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0)
    }

    fn index_at(&self, now: DateTime<Utc>) -> usize {
        let elapsed = self.elapsed_seconds(now);
        self.shrinks
            .iter()
            .rposition(|s| u64::from(s.at_second) <= elapsed)
            .unwrap_or(0)
    }

    /// The radius currently in force, meters.
    #[must_use]
    pub fn current_radius(&self, now: DateTime<Utc>) -> u32 {
        self.shrinks
            .get(self.index_at(now))
            .map_or(0, |s| s.radius_meters)
    }

    /// Advance the shrink index if a new shrink just became effective.
    ///
    /// Returns the new zone state when a shrink was applied, else `None`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<ZoneState> {
        let idx = self.index_at(now);
        if idx > self.shrink_idx {
            self.shrink_idx = idx;
            return Some(self.zone_state(now));
        }
        None
    }

    /// Classify a reported location and maintain the grace countdown.
    pub fn process_location(
        &mut self,
        address: WalletAddress,
        lat: f64,
        lng: f64,
        now: DateTime<Utc>,
    ) -> LocationVerdict {
        let radius = f64::from(self.current_radius(now));
        let inside = geo::within_radius(self.center_lat, self.center_lng, lat, lng, radius);

        if inside {
            self.out_of_zone.remove(&address);
            return LocationVerdict {
                in_zone: true,
                seconds_remaining: None,
            };
        }

        let exited_at = *self.out_of_zone.entry(address).or_insert(now);
        let outside_for = u64::try_from((now - exited_at).num_seconds()).unwrap_or(0);
        LocationVerdict {
            in_zone: false,
            seconds_remaining: Some(self.grace_seconds.saturating_sub(outside_for)),
        }
    }

    /// Players whose grace has fully elapsed, sorted by address for
    /// deterministic downstream ordering.
    #[must_use]
    pub fn expired_players(&self, now: DateTime<Utc>) -> Vec<WalletAddress> {
        let mut expired: Vec<WalletAddress> = self
            .out_of_zone
            .iter()
            .filter(|(_, exited_at)| {
                u64::try_from((now - **exited_at).num_seconds()).unwrap_or(0)
                    >= self.grace_seconds
            })
            .map(|(addr, _)| *addr)
            .collect();
        expired.sort_unstable();
        expired
    }

    /// Drop a player's out-of-zone state (death or game end).
    pub fn clear_player(&mut self, address: WalletAddress) {
        self.out_of_zone.remove(&address);
    }

    /// Snapshot of the current disk and the next scheduled shrink.
    #[must_use]
    pub fn zone_state(&self, now: DateTime<Utc>) -> ZoneState {
        let idx = self.index_at(now);
        let next = self.shrinks.get(idx + 1);
        ZoneState {
            center_lat: self.center_lat,
            center_lng: self.center_lng,
            current_radius_meters: self.shrinks.get(idx).map_or(0, |s| s.radius_meters),
            next_shrink_at: next
                .map(|s| (self.started_at + chrono::Duration::seconds(i64::from(s.at_second))).timestamp()),
            next_radius_meters: next.map(|s| s.radius_meters),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::primitives::GameId;

    fn shrinks(specs: &[(u32, u32)]) -> Vec<ZoneShrink> {
        specs
            .iter()
            .map(|&(at_second, radius_meters)| ZoneShrink {
                game_id: GameId::new(1),
                at_second,
                radius_meters,
            })
            .collect()
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn tracker() -> ZoneTracker {
        // Center at (0, 0); 2 km initial, 1 km at t+600, 300 m at t+1200.
        ZoneTracker::new(
            (0, 0),
            shrinks(&[(0, 2000), (600, 1000), (1200, 300)]),
            start(),
            60,
        )
    }

    #[test]
    fn radius_follows_schedule() {
        let z = tracker();
        assert_eq!(z.current_radius(start()), 2000);
        assert_eq!(z.current_radius(start() + Duration::seconds(599)), 2000);
        assert_eq!(z.current_radius(start() + Duration::seconds(600)), 1000);
        assert_eq!(z.current_radius(start() + Duration::seconds(5000)), 300);
    }

    #[test]
    fn tick_fires_once_per_shrink() {
        let mut z = tracker();
        assert!(z.tick(start() + Duration::seconds(30)).is_none());

        let state = z.tick(start() + Duration::seconds(600)).unwrap();
        assert_eq!(state.current_radius_meters, 1000);
        assert_eq!(state.next_radius_meters, Some(300));
        assert_eq!(
            state.next_shrink_at,
            Some(start().timestamp() + 1200)
        );

        // Same shrink does not fire twice.
        assert!(z.tick(start() + Duration::seconds(601)).is_none());

        let state = z.tick(start() + Duration::seconds(1200)).unwrap();
        assert_eq!(state.current_radius_meters, 300);
        assert_eq!(state.next_shrink_at, None);
    }

    #[test]
    fn inside_point_clears_grace() {
        let mut z = tracker();
        let p = WalletAddress::new([1; 20]);

        // ~1.1 km east of center: inside 2 km.
        let v = z.process_location(p, 0.0, 0.01, start());
        assert!(v.in_zone);

        // ~5.5 km east: outside.
        let v = z.process_location(p, 0.0, 0.05, start() + Duration::seconds(10));
        assert!(!v.in_zone);
        assert_eq!(v.seconds_remaining, Some(60));

        // Coming back inside clears the countdown.
        let v = z.process_location(p, 0.0, 0.0, start() + Duration::seconds(30));
        assert!(v.in_zone);
        let v = z.process_location(p, 0.0, 0.05, start() + Duration::seconds(40));
        assert_eq!(v.seconds_remaining, Some(60));
    }

    #[test]
    fn grace_counts_down_monotonically() {
        let mut z = tracker();
        let p = WalletAddress::new([2; 20]);

        let v0 = z.process_location(p, 0.0, 0.05, start());
        let v30 = z.process_location(p, 0.0, 0.05, start() + Duration::seconds(30));
        let v59 = z.process_location(p, 0.0, 0.05, start() + Duration::seconds(59));
        assert_eq!(v0.seconds_remaining, Some(60));
        assert_eq!(v30.seconds_remaining, Some(30));
        assert_eq!(v59.seconds_remaining, Some(1));

        assert!(z.expired_players(start() + Duration::seconds(59)).is_empty());
        assert_eq!(
            z.expired_players(start() + Duration::seconds(60)),
            vec![p]
        );
    }

    #[test]
    fn expired_players_sorted_deterministically() {
        let mut z = tracker();
        let a = WalletAddress::new([9; 20]);
        let b = WalletAddress::new([1; 20]);
        z.process_location(a, 0.0, 0.05, start());
        z.process_location(b, 0.0, 0.05, start());

        assert_eq!(
            z.expired_players(start() + Duration::seconds(60)),
            vec![b, a]
        );
    }

    #[test]
    fn clear_player_stops_tracking() {
        let mut z = tracker();
        let p = WalletAddress::new([3; 20]);
        z.process_location(p, 0.0, 0.05, start());
        z.clear_player(p);
        assert!(z.expired_players(start() + Duration::seconds(120)).is_empty());
    }

    #[test]
    fn shrinking_zone_can_strand_a_player() {
        let mut z = tracker();
        let p = WalletAddress::new([4; 20]);

        // ~1.6 km east: inside the 2 km ring, outside the 1 km ring.
        let v = z.process_location(p, 0.0, 0.015, start());
        assert!(v.in_zone);
        let v = z.process_location(p, 0.0, 0.015, start() + Duration::seconds(700));
        assert!(!v.in_zone);
        assert_eq!(v.seconds_remaining, Some(60));
    }

    #[test]
    fn recovery_reseed_continues_countdown() {
        // Simulates a restart: the ping is 70 s old with grace 60.
        let mut z = tracker();
        let p = WalletAddress::new([5; 20]);
        let ping_time = start() + Duration::seconds(100);
        let now = ping_time + Duration::seconds(70);

        let v = z.process_location(p, 0.0, 0.05, ping_time);
        assert!(!v.in_zone);
        assert_eq!(z.expired_players(now), vec![p]);
    }
}
