//! One-shot delayed execution for expiry callbacks.
//!
//! Schedulers are fire-and-forget: no cancellation and no persistence. A
//! scheduled task either runs once after its delay or is lost with the
//! process. The lock state machine is built around this weakness: the
//! persisted timestamp, not the timer, answers "is it locked".

use chrono::Duration;
use std::sync::Mutex;
use std::thread;
use std::time::Duration as StdDuration;

/// A scheduled unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// One-shot delayed execution.
pub trait DelayScheduler: Send + Sync {
    /// Run `task` once after `delay`.
    ///
    /// Zero or negative delays mean "as soon as possible" but the task must
    /// still run asynchronously, never inline from this call.
    fn after(&self, delay: Duration, task: Task);
}

/// Scheduler backed by one thread per scheduled task.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl DelayScheduler for ThreadScheduler {
    fn after(&self, delay: Duration, task: Task) {
        // to_std fails on negative durations; both cases clamp to zero.
        let wait = delay.to_std().unwrap_or(StdDuration::ZERO);
        thread::spawn(move || {
            if !wait.is_zero() {
                thread::sleep(wait);
            }
            task();
        });
    }
}

/// Deterministic scheduler for tests: time only moves when [`advance`] is
/// called, and pending work can be inspected.
///
/// [`advance`]: ManualScheduler::advance
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

struct ManualState {
    /// Virtual time elapsed since construction.
    elapsed: Duration,
    pending: Vec<Entry>,
}

struct Entry {
    due: Duration,
    task: Task,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                elapsed: Duration::zero(),
                pending: Vec::new(),
            }),
        }
    }

    /// Number of tasks waiting to fire.
    pub fn pending(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Move virtual time forward by `by` and run everything that comes due,
    /// in due order.
    ///
    /// Tasks run outside the internal lock, so they may schedule further
    /// work; anything they add within the advanced window fires in the same
    /// call.
    pub fn advance(&self, by: Duration) {
        let target = self.lock_state().elapsed + by.max(Duration::zero());

        loop {
            let task = {
                let mut state = self.lock_state();
                let next = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= target)
                    .min_by_key(|(_, entry)| entry.due)
                    .map(|(index, _)| index);

                match next {
                    Some(index) => {
                        let entry = state.pending.remove(index);
                        state.elapsed = entry.due.max(state.elapsed);
                        entry.task
                    }
                    None => {
                        state.elapsed = target;
                        break;
                    }
                }
            };

            task();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl DelayScheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) {
        let mut state = self.lock_state();
        let due = state.elapsed + delay.max(Duration::zero());
        state.pending.push(Entry { due, task });
    }
}
