//! Stress run configuration.

use std::time::Duration;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default number of consumer threads per round.
pub const DEFAULT_WORKERS: usize = 8;

/// Default number of work tasks enqueued per round.
pub const DEFAULT_WORK_ITEMS: usize = 256;

/// Default number of rounds.
pub const DEFAULT_ROUNDS: usize = 20_000;

/// Default consumer poll timeout.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default pause between winning an item and locking the store.
///
/// Makes a broken hand-off reproduce far more often than it would with back
/// to back acquire and lock.
pub const DEFAULT_DEQUEUE_DELAY: Duration = Duration::from_nanos(500);

/// Shape of a stress run.
///
/// The default is the reference scenario: capacity 32, 8 consumers, 256 work
/// tasks per round, 20 000 rounds.
///
/// # Example
///
/// ```
/// use nexus_stress::StressConfig;
/// use std::time::Duration;
///
/// let config = StressConfig::default()
///     .rounds(100)
///     .workers(4)
///     .dequeue_delay(None);
///
/// assert_eq!(config.rounds, 100);
/// assert_eq!(config.expected_total(), 100 * 256);
/// assert_eq!(config.poll_interval, Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressConfig {
    /// Queue capacity.
    pub capacity: usize,
    /// Consumer threads per round.
    pub workers: usize,
    /// Work tasks enqueued per round.
    pub work_items: usize,
    /// Number of rounds.
    pub rounds: usize,
    /// How long a consumer waits for a task before re-checking the stop flag.
    pub poll_interval: Duration,
    /// Pause between winning an item and locking the store, if any.
    pub dequeue_delay: Option<Duration>,
}

impl StressConfig {
    /// Sets the queue capacity.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of consumer threads per round.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the number of work tasks per round.
    #[must_use]
    pub const fn work_items(mut self, work_items: usize) -> Self {
        self.work_items = work_items;
        self
    }

    /// Sets the number of rounds.
    #[must_use]
    pub const fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the consumer poll timeout.
    #[must_use]
    pub const fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the dequeue delay. `None` disables it.
    #[must_use]
    pub const fn dequeue_delay(mut self, dequeue_delay: Option<Duration>) -> Self {
        self.dequeue_delay = dequeue_delay;
        self
    }

    /// Work tasks a full run must execute.
    #[must_use]
    pub const fn expected_total(&self) -> u64 {
        self.rounds as u64 * self.work_items as u64
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: DEFAULT_WORKERS,
            work_items: DEFAULT_WORK_ITEMS,
            rounds: DEFAULT_ROUNDS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dequeue_delay: Some(DEFAULT_DEQUEUE_DELAY),
        }
    }
}
