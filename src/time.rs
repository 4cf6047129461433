//! Timestamp conversions shared with the durable store.
//!
//! Lock expiries are persisted as f64 seconds since the Unix epoch. The
//! sentinel values below land in shared stores, so their concrete values are
//! part of the on-disk compatibility surface and must not change.

use chrono::{DateTime, Utc};

/// Persisted value for "locked indefinitely": 4001-01-01T00:00:00Z.
pub const DISTANT_FUTURE_SECS: f64 = 64_092_211_200.0;

/// Persisted value for "unlocked long ago": 0001-01-01T00:00:00Z.
pub const DISTANT_PAST_SECS: f64 = -62_135_769_600.0;

/// The timestamp an indefinite lock is persisted under.
pub fn distant_future() -> DateTime<Utc> {
    from_epoch_secs(DISTANT_FUTURE_SECS)
}

/// The timestamp a plain unlock is persisted under.
pub fn distant_past() -> DateTime<Utc> {
    from_epoch_secs(DISTANT_PAST_SECS)
}

/// Convert a persisted seconds-since-epoch value to a timestamp.
///
/// Non-finite or out-of-range values collapse to the epoch, which reads as
/// "already expired". The saturating float cast plus chrono's own range check
/// make this total.
pub fn from_epoch_secs(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0) as i64).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Convert a timestamp to the f64 the store persists.
pub fn to_epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
