//! Wall-clock helpers for sample timestamps

use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Nanoseconds since the Unix epoch
///
/// Returns 0 if the system clock is set before the epoch.
pub fn current_timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Signed difference `later - earlier` in seconds
#[inline]
pub fn ns_to_secs(earlier: u64, later: u64) -> f64 {
    (later as i128 - earlier as i128) as f64 / NANOS_PER_SEC
}
