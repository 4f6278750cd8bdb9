//! Bluetooth token canonicalization and matching.
//!
//! Clients report the BLE identifiers they currently see; the proof is a
//! set-membership test against the target's stored token. Platforms format
//! the same identifier differently (case, `:` vs `-` separators, stray
//! whitespace), so both sides are canonicalized before comparison.

/// Canonicalize a Bluetooth identifier for comparison.
///
/// Lowercases, trims, and strips `:` / `-` separators, so
/// `"AA:BB:CC:DD:EE:FF"`, `"aa-bb-cc-dd-ee-ff"` and `"aabbccddeeff"` all
/// compare equal.
#[must_use]
pub fn canonicalize(token: &str) -> String {
    token
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether `stored` matches any of the reported nearby identifiers.
///
/// Empty stored tokens never match.
#[must_use]
pub fn matches_any<S: AsRef<str>>(stored: &str, nearby: &[S]) -> bool {
    let stored = canonicalize(stored);
    if stored.is_empty() {
        return false;
    }
    nearby.iter().any(|t| canonicalize(t.as_ref()) == stored)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
