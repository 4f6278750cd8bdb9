//! Geographic utilities: great-circle distance and coordinate conversion.
//!
//! The settlement contract stores coordinates as signed integers scaled by
//! 10^6 ("micro-degrees"); all distance math happens in f64 degrees. The
//! Haversine formula with a spherical Earth is accurate to well under a
//! meter at game scales (hundreds to thousands of meters).

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Scale factor between degrees and the contract's fixed-point integers.
const MICRO: f64 = 1_000_000.0;

/// Convert a fixed-point micro-degree coordinate to degrees.
#[must_use]
pub fn micro_to_degrees(micro: i32) -> f64 {
    f64::from(micro) / MICRO
}

/// Convert degrees to the contract's fixed-point micro-degree integer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn degrees_to_micro(degrees: f64) -> i32 {
    (degrees * MICRO).round() as i32
}

/// Great-circle distance between two points in meters (Haversine).
#[must_use]
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Whether a point lies within `radius_meters` of a center.
#[must_use]
pub fn within_radius(
    center_lat: f64,
    center_lng: f64,
    lat: f64,
    lng: f64,
    radius_meters: f64,
) -> bool {
    haversine_meters(center_lat, center_lng, lat, lng) <= radius_meters
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micro_roundtrip() {
        assert_eq!(degrees_to_micro(micro_to_degrees(52_520_008)), 52_520_008);
        assert_eq!(degrees_to_micro(micro_to_degrees(-13_404_954)), -13_404_954);
        assert_eq!(degrees_to_micro(0.0), 0);
    }

    #[test]
    fn zero_distance_at_same_point() {
        assert!(haversine_meters(52.52, 13.405, 52.52, 13.405) < 1e-9);
    }

    #[test]
    fn known_distance_berlin_to_potsdam() {
        // Alexanderplatz to Potsdam central station, roughly 27.5 km.
        let d = haversine_meters(52.521_92, 13.413_215, 52.391_85, 13.067_7);
        assert!((d - 27_518.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn one_degree_latitude_is_about_111km() {
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn within_radius_boundary() {
        // ~157 m east at the equator
        let d = haversine_meters(0.0, 0.0, 0.0, 0.001_41);
        assert!(within_radius(0.0, 0.0, 0.0, 0.001_41, d + 1.0));
        assert!(!within_radius(0.0, 0.0, 0.0, 0.001_41, d - 1.0));
    }

    #[test]
    fn crosses_antimeridian() {
        // Two points straddling 180° longitude are close, not half a world apart.
        let d = haversine_meters(0.0, 179.999, 0.0, -179.999);
        assert!(d < 1000.0, "got {d}");
    }
}
