//! A counting semaphore with blocking, non-blocking and timed acquire.
//!
//! Permits live in a single atomic counter. Acquiring is a CAS decrement,
//! releasing is an increment. Blocked acquirers go through the same phases as
//! the nexus channel before they cost a syscall:
//!
//! ```text
//! Phase 1: Fast path
//! ├── CAS the permit count down by one
//! └── Succeeds whenever a permit is already available
//!
//! Phase 2: Backoff (spin + yield)
//! ├── crossbeam's Backoff::snooze()
//! ├── Configurable iterations (default: 8)
//! └── Catches permits released "soon"
//!
//! Phase 3: Park
//! ├── Register as a waiter, wait on a condvar
//! └── Only when no permit is coming
//! ```
//!
//! Unlike the SPSC channel there can be any number of parked acquirers, so the
//! park phase uses a `Mutex`/`Condvar` pair instead of a per-thread `Parker`.
//!
//! # Example
//!
//! ```
//! use nexus_semaphore::Semaphore;
//! use std::time::Duration;
//!
//! let sem = Semaphore::new(1);
//!
//! assert!(sem.try_acquire());
//! assert!(!sem.try_acquire());
//! assert!(!sem.try_acquire_for(Duration::from_millis(1)));
//!
//! sem.release();
//! assert!(sem.try_acquire_for(Duration::from_millis(1)));
//! ```
//!
//! # Memory Ordering
//!
//! A semaphore is only useful as a hand-off point if the permit carries the
//! releaser's prior writes with it. Every successful decrement and every
//! increment of the permit count is `SeqCst`, which includes acquire/release:
//!
//! ```text
//! Releaser:                         Acquirer:
//! ─────────────────────             ─────────────────────
//! write(data)
//! permits.fetch_add [Release]  ──▶  permits.cas [Acquire] succeeds
//!                                   read(data)  -> sees the write
//! ```
//!
//! The park phase needs a stronger guarantee. The waiter count and the permit
//! count form a Dekker pair:
//!
//! ```text
//! Acquirer:                         Releaser:
//! ─────────────────────             ─────────────────────
//! waiters += 1       [SeqCst]       permits += 1   [SeqCst]
//! load(permits) -> 0 [SeqCst]       load(waiters)  [SeqCst]
//! wait()                            if waiters > 0 { notify }
//! ```
//!
//! The single total order over `SeqCst` operations rules out both loads
//! returning the stale value, so a release never skips a parked acquirer. The
//! releaser notifies while holding the parking lock, and the acquirer holds
//! that lock from its last check until `wait` releases it, so the notification
//! cannot fall between the two.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_utils::{Backoff, CachePadded};

/// Default number of backoff snooze iterations before parking.
pub const DEFAULT_SNOOZE_ITERS: usize = 8;

/// A counting semaphore.
///
/// The semaphore is `Sync`; share it by reference or wrap it in an `Arc`.
///
/// # Example
///
/// ```
/// use nexus_semaphore::Semaphore;
/// use std::sync::Arc;
/// use std::thread;
///
/// let sem = Arc::new(Semaphore::new(0));
/// let sem2 = Arc::clone(&sem);
///
/// let handle = thread::spawn(move || sem2.acquire());
///
/// sem.release();
/// handle.join().unwrap();
/// assert_eq!(sem.available(), 0);
/// ```
pub struct Semaphore {
    permits: CachePadded<AtomicUsize>,
    waiters: CachePadded<AtomicUsize>,
    max: usize,
    snooze_iters: usize,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits, with no upper bound.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self::with_config(permits, usize::MAX, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a semaphore holding `permits` permits that may never hold more
    /// than `max`.
    ///
    /// # Panics
    ///
    /// Panics if `permits > max`.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_semaphore::Semaphore;
    ///
    /// let sem = Semaphore::bounded(0, 4);
    /// assert_eq!(sem.available(), 0);
    /// assert_eq!(sem.max(), 4);
    /// ```
    #[must_use]
    pub fn bounded(permits: usize, max: usize) -> Self {
        Self::with_config(permits, max, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a bounded semaphore with a custom backoff configuration.
    ///
    /// # Arguments
    ///
    /// * `permits` - Initial permit count
    /// * `max` - Upper bound on the permit count
    /// * `snooze_iters` - Number of backoff iterations before parking. Higher
    ///   values burn more CPU but avoid the condvar for short waits.
    ///
    /// # Panics
    ///
    /// Panics if `permits > max`.
    #[must_use]
    pub fn with_config(permits: usize, max: usize, snooze_iters: usize) -> Self {
        assert!(
            permits <= max,
            "initial permits {permits} exceed maximum {max}"
        );

        Self {
            permits: CachePadded::new(AtomicUsize::new(permits)),
            waiters: CachePadded::new(AtomicUsize::new(0)),
            max,
            snooze_iters,
            lock: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    /// Takes a permit if one is available, without blocking.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_semaphore::Semaphore;
    ///
    /// let sem = Semaphore::new(1);
    /// assert!(sem.try_acquire());
    /// assert!(!sem.try_acquire());
    /// ```
    #[inline]
    pub fn try_acquire(&self) -> bool {
        let mut current = self.permits.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return false;
            }
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Takes a permit, blocking for as long as it takes.
    pub fn acquire(&self) {
        let acquired = self.acquire_inner(None);
        debug_assert!(acquired);
    }

    /// Takes a permit, blocking for at most `timeout`.
    ///
    /// Returns `false` if the timeout elapsed with no permit available.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_semaphore::Semaphore;
    /// use std::time::{Duration, Instant};
    ///
    /// let sem = Semaphore::new(0);
    ///
    /// let start = Instant::now();
    /// assert!(!sem.try_acquire_for(Duration::from_millis(10)));
    /// assert!(start.elapsed() >= Duration::from_millis(10));
    /// ```
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        // An unrepresentable deadline is as good as no deadline.
        self.acquire_inner(Instant::now().checked_add(timeout))
    }

    /// Takes a permit, blocking until `deadline` at the latest.
    ///
    /// Returns `false` if the deadline passed with no permit available. A
    /// deadline in the past still gets one non-blocking attempt.
    pub fn try_acquire_until(&self, deadline: Instant) -> bool {
        self.acquire_inner(Some(deadline))
    }

    /// Returns one permit, waking a parked acquirer if there is one.
    ///
    /// # Panics
    ///
    /// Panics if the release would push the permit count past the maximum.
    /// That only happens when a caller releases a permit it never acquired.
    pub fn release(&self) {
        let mut current = self.permits.load(Ordering::SeqCst);
        loop {
            assert!(
                current < self.max,
                "semaphore released past its maximum of {}",
                self.max
            );
            match self.permits.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.park_lock();
            self.cvar.notify_one();
        }
    }

    /// Returns the number of permits available right now.
    ///
    /// This is a snapshot; it may be stale by the time the caller looks at it.
    #[inline]
    pub fn available(&self) -> usize {
        self.permits.load(Ordering::SeqCst)
    }

    /// Returns the maximum number of permits the semaphore may hold.
    #[inline]
    pub const fn max(&self) -> usize {
        self.max
    }

    fn acquire_inner(&self, deadline: Option<Instant>) -> bool {
        // Fast path
        if self.try_acquire() {
            return true;
        }

        // Backoff phase
        let backoff = Backoff::new();
        for _ in 0..self.snooze_iters {
            backoff.snooze();

            if self.try_acquire() {
                return true;
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
        }

        // Park phase
        let mut guard = self.park_lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);

        let acquired = loop {
            // Check after registering - prevents missed wakeup race
            if self.try_acquire() {
                break true;
            }

            match deadline {
                None => {
                    guard = self
                        .cvar
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break false;
                    }
                    guard = self
                        .cvar
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        acquired
    }

    /// The parking lock guards no data, so a poisoned lock is still usable.
    fn park_lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("available", &self.available())
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
