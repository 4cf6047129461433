//! The `TimedLock` type and its lock/relock/unlock operations.

use crate::scheduler::DelayScheduler;
use crate::store::DurableStore;
use crate::time;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback invoked when a lock expires on schedule.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// A named lock whose expiry timestamp survives process restarts.
///
/// The lock is bound to a string identity; instances sharing an identity and
/// a store share the persisted timestamp but each keep their own pending
/// completion. Construction has no side effects; the store is first touched
/// by a query or a lock operation.
///
/// All operations on one instance are serialized: the completion slot's
/// mutex is held across each operation's read-check-write against the store,
/// so concurrent `lock` calls cannot both observe "unlocked". Instances with
/// different identities never contend with each other.
pub struct TimedLock {
    shared: Arc<Shared>,
}

struct Shared {
    identity: String,
    key: String,
    store: Arc<dyn DurableStore>,
    scheduler: Arc<dyn DelayScheduler>,

    /// Pending completion slot. The mutex doubles as the instance's
    /// exclusive execution context.
    completion: Mutex<Option<Completion>>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<Completion>> {
        self.completion
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn locked_until(&self) -> DateTime<Utc> {
        time::from_epoch_secs(self.store.get(&self.key))
    }

    fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until() > now
    }

    fn persist_until(&self, at: DateTime<Utc>) {
        self.store.set(&self.key, time::to_epoch_secs(at));
    }
}

impl TimedLock {
    /// Create a lock bound to `identity`, backed by the given store and
    /// scheduler. Performs no I/O.
    pub fn new(
        identity: impl Into<String>,
        store: Arc<dyn DurableStore>,
        scheduler: Arc<dyn DelayScheduler>,
    ) -> Self {
        let identity = identity.into();
        let key = format!("tl-{}", identity);

        Self {
            shared: Arc::new(Shared {
                identity,
                key,
                store,
                scheduler,
                completion: Mutex::new(None),
            }),
        }
    }

    /// The identity this lock was created with.
    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    /// Whether the persisted expiry is strictly in the future.
    ///
    /// Always consults the store, never an in-memory timer, so the answer is
    /// correct across process restarts and reflects writes by other
    /// instances sharing the same identity and store.
    pub fn is_locked(&self) -> bool {
        let _slot = self.shared.slot();
        self.shared.is_locked_at(Utc::now())
    }

    /// The persisted expiry timestamp. An identity that was never locked
    /// reads as the Unix epoch, i.e. already expired.
    pub fn locked_until(&self) -> DateTime<Utc> {
        let _slot = self.shared.slot();
        let until = self.shared.locked_until();

        tracing::debug!(identity = %self.shared.identity, %until, "locked until");

        until
    }

    /// Overwrite the persisted expiry directly.
    ///
    /// Persists immediately; does not touch the pending completion and
    /// schedules nothing.
    pub fn set_locked_until(&self, at: DateTime<Utc>) {
        let _slot = self.shared.slot();
        self.shared.persist_until(at);

        tracing::debug!(identity = %self.shared.identity, until = %at, "locked-until overwritten");
    }

    /// Lock indefinitely (until the distant-future sentinel).
    ///
    /// Returns false and changes nothing when already locked.
    pub fn lock(&self, on_expire: Option<Completion>) -> bool {
        self.lock_until(time::distant_future(), on_expire)
    }

    /// Lock for `duration` from now. Returns false when already locked.
    pub fn lock_for(&self, duration: Duration, on_expire: Option<Completion>) -> bool {
        self.lock_until(Utc::now() + duration, on_expire)
    }

    /// Lock until `at`.
    ///
    /// When currently unlocked: persists `at`, replaces the pending
    /// completion (the previous one is dropped, not invoked), schedules the
    /// expiry handler after `at - now`, and returns true. A past `at` still
    /// schedules, with the handler running asynchronously as soon as possible, never
    /// inline. When already locked: returns false with no state change.
    pub fn lock_until(&self, at: DateTime<Utc>, on_expire: Option<Completion>) -> bool {
        let now = Utc::now();
        let mut slot = self.shared.slot();

        if self.shared.is_locked_at(now) {
            tracing::debug!(
                identity = %self.shared.identity,
                until = %self.shared.locked_until(),
                "lock refused, already locked"
            );
            return false;
        }

        self.acquire(&mut slot, now, at, on_expire);
        true
    }

    /// Lock indefinitely, regardless of current state. Always returns true.
    pub fn relock(&self, on_expire: Option<Completion>) -> bool {
        self.relock_until(time::distant_future(), on_expire)
    }

    /// Lock for `duration` from now, regardless of current state.
    pub fn relock_for(&self, duration: Duration, on_expire: Option<Completion>) -> bool {
        self.relock_until(Utc::now() + duration, on_expire)
    }

    /// Unconditional form of [`lock_until`](Self::lock_until): overwrites the
    /// persisted expiry, replaces the pending completion, and reschedules,
    /// whether or not the lock is currently held. The escape hatch for
    /// extending or shortening a lock in place. Always returns true.
    pub fn relock_until(&self, at: DateTime<Utc>, on_expire: Option<Completion>) -> bool {
        let now = Utc::now();
        let mut slot = self.shared.slot();

        self.acquire(&mut slot, now, at, on_expire);
        true
    }

    /// Unlock immediately (persists the distant-past sentinel).
    pub fn unlock(&self) {
        self.unlock_at(time::distant_past());
    }

    /// Move the expiry to `duration` from now and drop the pending
    /// completion. With a positive duration this shortens (or extends) the
    /// lock rather than releasing it.
    pub fn unlock_after(&self, duration: Duration) {
        self.unlock_at(Utc::now() + duration);
    }

    /// Persist `at` as the expiry and clear the pending completion without
    /// invoking it. Any timer already in flight is not cancelled; it will
    /// find the slot empty (or owned by a newer lock) when it fires.
    pub fn unlock_at(&self, at: DateTime<Utc>) {
        let mut slot = self.shared.slot();

        self.shared.persist_until(at);
        *slot = None;

        tracing::debug!(identity = %self.shared.identity, until = %at, "unlocked");
    }

    /// Success path shared by the lock and relock families. Caller holds the
    /// slot guard.
    fn acquire(
        &self,
        slot: &mut Option<Completion>,
        now: DateTime<Utc>,
        at: DateTime<Utc>,
        on_expire: Option<Completion>,
    ) {
        self.shared.persist_until(at);
        *slot = on_expire;

        tracing::debug!(identity = %self.shared.identity, until = %at, "locked");

        self.schedule_expiry(at - now);
    }

    fn schedule_expiry(&self, delay: Duration) {
        // Strong reference: an outstanding timer keeps the shared state
        // alive even if every TimedLock handle is dropped first.
        let shared = Arc::clone(&self.shared);

        self.shared.scheduler.after(
            delay,
            Box::new(move || {
                // Take whatever completion is current; it may belong to a
                // newer lock than the one that scheduled this timer. Invoked
                // outside the slot lock so a completion may use the lock.
                let current = shared.slot().take();

                if let Some(complete) = current {
                    tracing::debug!(identity = %shared.identity, "lock expired, running completion");
                    complete();
                }
            }),
        );
    }
}
