//! A bounded, blocking MPMC queue built on two counting semaphores.
//!
//! The queue keeps its items in a `Mutex<VecDeque<T>>` and tracks occupancy
//! with two [`Semaphore`]s:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ free_slots: permits = capacity - resident items              │
//! │ produced:   permits = items pushed but not yet claimed       │
//! │ items:      Mutex<VecDeque<T>>  (the only mutable payload)   │
//! └──────────────────────────────────────────────────────────────┘
//!
//! enqueue:  free_slots.acquire -> lock; push_back; unlock -> produced.release
//! dequeue:  produced.acquire   -> lock; pop_front; unlock -> free_slots.release
//! ```
//!
//! `free_slots` caps the number of resident items at `capacity`, and
//! `produced` hands out the right to pop. Neither side waits on a condition
//! variable tied to the store; the semaphores are the only coordination.
//!
//! # The Hand-Off Contract
//!
//! A consumer that wins a `produced` permit immediately locks the store and
//! pops. That pop must find an item, which holds only if the permit carries
//! the producer's push with it:
//!
//! ```text
//! Producer:                          Consumer:
//! ─────────────────────              ─────────────────────
//! lock; push_back(x); unlock
//! produced.release   [Release]  ──▶  produced.acquire [Acquire]
//!                                    lock; pop_front() -> Some(x)
//! ```
//!
//! [`Semaphore`] performs every permit transfer with `SeqCst`, so the release
//! synchronizes-with the acquire that consumes it. If a semaphore only ordered
//! its own counter, a consumer could be woken for an item whose push it cannot
//! yet see, and would find the store empty. That state is treated as a fatal
//! bug: dequeue panics rather than returning a value it doesn't have.
//!
//! # Example
//!
//! ```
//! use nexus_bounded::BoundedBlockingQueue;
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let queue = Arc::new(BoundedBlockingQueue::<u64>::new(4));
//!
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         let mut sum = 0;
//!         for _ in 0..100 {
//!             sum += queue.dequeue();
//!         }
//!         sum
//!     })
//! };
//!
//! for i in 0..100 {
//!     queue.enqueue(i); // blocks while 4 items are resident
//! }
//!
//! assert_eq!(consumer.join().unwrap(), 99 * 100 / 2);
//! assert!(queue.try_dequeue_for(Duration::from_millis(1)).is_none());
//! ```
//!
//! # When to Use This
//!
//! This queue favours an explicit, checkable synchronization contract over
//! raw speed. For throughput, `crossbeam-channel` or `nexus_queue` are
//! better choices.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use core::fmt;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use nexus_semaphore::Semaphore;

/// A bounded FIFO queue with blocking enqueue and timed dequeue.
///
/// Any number of threads may enqueue and dequeue concurrently through a
/// shared reference.
pub struct BoundedBlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    produced: Semaphore,
    free_slots: Semaphore,
    capacity: usize,
    dequeue_delay: Option<Duration>,
}

impl<T> BoundedBlockingQueue<T> {
    /// Creates a queue that holds at most `capacity` items.
    ///
    /// Unlike the ring buffers, the capacity is exact; it is not rounded.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_bounded::BoundedBlockingQueue;
    ///
    /// let queue = BoundedBlockingQueue::<String>::new(32);
    /// assert_eq!(queue.capacity(), 32);
    /// assert!(queue.is_empty());
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            produced: Semaphore::bounded(0, capacity),
            free_slots: Semaphore::bounded(capacity, capacity),
            capacity,
            dequeue_delay: None,
        }
    }

    /// Creates a queue that pauses for `delay` between winning an item and
    /// locking the store to take it.
    ///
    /// The pause widens the window between the two halves of a dequeue. Stress
    /// runs use it to make ordering bugs in the hand-off far more likely to
    /// surface; it has no other purpose.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn with_dequeue_delay(capacity: usize, delay: Duration) -> Self {
        let mut queue = Self::new(capacity);
        queue.dequeue_delay = Some(delay);
        queue
    }

    /// Appends `item`, blocking while the queue is full.
    ///
    /// There is no timeout: if no consumer ever drains the queue, this call
    /// never returns.
    pub fn enqueue(&self, item: T) {
        self.free_slots.acquire();
        self.push(item);
    }

    /// Appends `item` if a slot is free, without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the queue is at capacity.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_bounded::{BoundedBlockingQueue, Full};
    ///
    /// let queue = BoundedBlockingQueue::new(1);
    ///
    /// assert!(queue.try_enqueue(1).is_ok());
    /// assert_eq!(queue.try_enqueue(2), Err(Full(2)));
    /// ```
    pub fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        if !self.free_slots.try_acquire() {
            return Err(Full(item));
        }
        self.push(item);
        Ok(())
    }

    /// Removes the front item, blocking until one is available.
    pub fn dequeue(&self) -> T {
        self.produced.acquire();
        self.pop()
    }

    /// Removes the front item if one is available, without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        if self.produced.try_acquire() {
            Some(self.pop())
        } else {
            None
        }
    }

    /// Removes the front item, waiting at most `timeout` for one to arrive.
    ///
    /// Returns `None` when the timeout elapses first. That is the normal
    /// "nothing yet" outcome, not an error.
    ///
    /// # Panics
    ///
    /// Panics if a granted item is missing from the store. That means the
    /// hand-off contract between enqueue and dequeue was broken, and the queue
    /// can no longer be trusted.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_bounded::BoundedBlockingQueue;
    /// use std::time::Duration;
    ///
    /// let queue = BoundedBlockingQueue::new(2);
    /// assert_eq!(queue.try_dequeue_for(Duration::from_millis(1)), None);
    ///
    /// queue.enqueue('a');
    /// assert_eq!(queue.try_dequeue_for(Duration::from_millis(1)), Some('a'));
    /// ```
    pub fn try_dequeue_for(&self, timeout: Duration) -> Option<T> {
        if self.produced.try_acquire_for(timeout) {
            Some(self.pop())
        } else {
            None
        }
    }

    /// Removes the front item, waiting until `deadline` at the latest.
    pub fn try_dequeue_until(&self, deadline: Instant) -> Option<T> {
        if self.produced.try_acquire_until(deadline) {
            Some(self.pop())
        } else {
            None
        }
    }

    /// Returns the number of resident items.
    ///
    /// This is a snapshot taken under the store lock.
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    /// Returns `true` if no items are resident.
    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }

    /// Returns the maximum number of resident items.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Second half of enqueue. The caller holds a `free_slots` permit.
    fn push(&self, item: T) {
        {
            let mut items = self.lock_items();
            items.push_back(item);
            assert!(
                items.len() <= self.capacity,
                "queue holds {} items, capacity is {}",
                items.len(),
                self.capacity
            );
        }
        // Lock is released; the permit publishes the push
        self.produced.release();
    }

    /// Second half of dequeue. The caller holds a `produced` permit.
    fn pop(&self) -> T {
        if let Some(delay) = self.dequeue_delay {
            thread::sleep(delay);
        }

        let item = self.lock_items().pop_front();
        let Some(item) = item else {
            panic!(
                "store empty after a produced permit was granted: \
                 enqueue's push is not visible to this dequeue"
            );
        };

        self.free_slots.release();
        item
    }

    /// A panic while the lock is held can only come from the capacity check,
    /// which leaves the deque itself intact.
    fn lock_items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBlockingQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error returned by [`BoundedBlockingQueue::try_enqueue`] when the queue is
/// full.
///
/// Contains the item that could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}
