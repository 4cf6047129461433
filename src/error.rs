//! Error types for the timedlock crate.
//!
//! Lock operations themselves never fail: the `lock` family signals "already
//! locked" through a boolean result, and the store/scheduler collaborators are
//! treated as infallible at call sites. Errors exist only at the fallible
//! edges, namely opening and parsing a file-backed store.

use thiserror::Error;

/// Main error type for timedlock operations.
#[derive(Error, Debug)]
pub enum TimedLockError {
    /// The durable store could not be read or written.
    #[error("store I/O failed: {0}")]
    StoreIo(String),

    /// The durable store file exists but does not hold the expected format.
    #[error("store data malformed: {0}")]
    StoreFormat(String),
}

/// Result type alias for timedlock operations.
pub type Result<T> = std::result::Result<T, TimedLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = TimedLockError::StoreIo("permission denied on '/var/store.json'".to_string());
        assert_eq!(
            err.to_string(),
            "store I/O failed: permission denied on '/var/store.json'"
        );

        let err = TimedLockError::StoreFormat("expected a JSON object".to_string());
        assert_eq!(err.to_string(), "store data malformed: expected a JSON object");
    }
}
