//! Persisted named timed locks with best-effort expiry callbacks.
//!
//! A [`TimedLock`] durably records "locked until time T" under a string
//! identity and answers "is it locked" from that persisted timestamp, so the
//! verdict survives process restarts. An optional callback fires when the
//! lock expires; the callback lives only in memory and is lost on restart.
//! The persisted state, never the timer, is the source of truth.
//!
//! Typical use is throttling repeated actions: "don't retry this operation
//! for 24 hours", in a process that may be killed and relaunched in between.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Duration;
//! use timedlock::{MemoryStore, ThreadScheduler, TimedLock};
//!
//! let store = Arc::new(MemoryStore::new());
//! let scheduler = Arc::new(ThreadScheduler::new());
//! let lock = TimedLock::new("daily-sync", store, scheduler);
//!
//! assert!(lock.lock_for(Duration::hours(24), None));
//! assert!(lock.is_locked());
//! assert!(!lock.lock(None)); // refused, already locked
//!
//! lock.unlock();
//! assert!(!lock.is_locked());
//! ```
//!
//! For restart survival, back the lock with a [`JsonFileStore`] instead of a
//! [`MemoryStore`]. This is not a distributed lock: instances in different
//! processes are only as coordinated as the shared store's single-key
//! get/set.

pub mod error;
pub mod lock;
pub mod scheduler;
pub mod store;
pub mod time;

pub use error::{Result, TimedLockError};
pub use lock::{Completion, TimedLock};
pub use scheduler::{DelayScheduler, ManualScheduler, Task, ThreadScheduler};
pub use store::{DurableStore, JsonFileStore, MemoryStore};
