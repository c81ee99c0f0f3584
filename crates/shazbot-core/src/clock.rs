//! Wall-clock time in milliseconds since the Unix epoch.

use web_time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds.
///
/// A clock set before 1970 reads as zero.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
