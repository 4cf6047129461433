//! The timed lock state machine.
//!
//! A [`TimedLock`] records "locked until T" in a durable store and answers
//! lock-status queries from that persisted timestamp alone. Expiry callbacks
//! ride on an in-memory timer with no persistence guarantee: a process
//! restart loses the callback but never the lock state.
//!
//! # Persisted format
//!
//! Each identity maps to the store key `tl-<identity>`, holding seconds since
//! the Unix epoch as an f64. Deployments sharing a store with existing data
//! must keep this prefix and unit.
//!
//! # Single-slot completions
//!
//! An instance holds at most one pending completion. Lock and relock replace
//! it without invoking the old one; unlock clears it silently; a firing timer
//! takes whatever the slot holds at that moment. Timers are never cancelled,
//! so a timer from a superseded lock can be the one that runs the current
//! completion.

mod timed;


pub use timed::{Completion, TimedLock};
