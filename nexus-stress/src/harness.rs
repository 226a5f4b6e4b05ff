//! Round driver.
//!
//! Each round runs the same choreography against one long-lived queue:
//!
//! ```text
//! producer (caller)                     consumers (workers)
//! ─────────────────                     ─────────────────────────────
//! spawn workers          ──────────▶    loop until stop_requested:
//! enqueue work × N                        try_dequeue_for(poll)
//! enqueue rendezvous × W                  Work       -> completed += 1
//! barrier.wait()   ◀── all W + 1 ──▶      Rendezvous -> barrier.wait()
//! stop_requested = true
//! join workers
//! check counts, barrier, leftovers
//! ```
//!
//! Every rendezvous task is queued behind every work task, and each consumer
//! that takes one blocks until all parties arrive. The barrier therefore only
//! opens once all work has been dequeued and each consumer holds exactly one
//! rendezvous, so setting the stop flag afterwards cannot strand work.

use core::fmt;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::sync::WaitGroup;
use nexus_bounded::BoundedBlockingQueue;

use crate::config::StressConfig;
use crate::error::Violation;
use crate::task::{Task, TaskQueue};
use crate::thread_group::ThreadGroup;

/// Thread name prefix for round consumers.
const CONSUMER_NAME: &str = "stress-consumer";

/// Drives stress rounds against a single queue.
///
/// The harness owns the queue and the completion counter; nothing is global,
/// so several harnesses can run side by side.
///
/// Rounds on one harness run one at a time: each round checks the shared
/// queue and counter against what it alone put in, so running rounds take
/// `&mut self`.
///
/// ```compile_fail
/// use nexus_stress::{Harness, StressConfig};
///
/// let mut harness = Harness::new(StressConfig::default().rounds(1));
/// std::thread::scope(|s| {
///     s.spawn(|| harness.run());
///     s.spawn(|| harness.run());
/// });
/// ```
///
/// # Example
///
/// ```
/// use nexus_stress::{Harness, StressConfig};
///
/// let config = StressConfig::default()
///     .rounds(10)
///     .workers(2)
///     .work_items(64)
///     .dequeue_delay(None);
///
/// let report = Harness::new(config).run().unwrap();
/// assert_eq!(report.completed, 640);
/// ```
pub struct Harness {
    config: StressConfig,
    queue: Arc<TaskQueue>,
    completed: Arc<AtomicU64>,
}

/// Per-round flags shared with that round's consumers.
struct RoundState {
    stop_requested: AtomicBool,
    arrivals: AtomicUsize,
    poll_timeouts: AtomicU64,
}

impl Harness {
    /// Creates a harness and its queue.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` or `config.workers` is 0.
    #[must_use]
    pub fn new(config: StressConfig) -> Self {
        assert!(config.workers > 0, "a round needs at least one consumer");

        let queue = match config.dequeue_delay {
            Some(delay) => BoundedBlockingQueue::with_dequeue_delay(config.capacity, delay),
            None => BoundedBlockingQueue::new(config.capacity),
        };

        Self {
            config,
            queue: Arc::new(queue),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Runs every configured round, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first [`Violation`] found, either inside a round or in the
    /// final total.
    pub fn run(&mut self) -> Result<StressReport, Violation> {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), calling `on_round` after each clean round.
    ///
    /// # Errors
    ///
    /// Returns the first [`Violation`] found.
    pub fn run_with<F>(&mut self, mut on_round: F) -> Result<StressReport, Violation>
    where
        F: FnMut(&RoundReport),
    {
        let start = Instant::now();
        let baseline = self.completed.load(Ordering::Relaxed);
        let mut poll_timeouts = 0;
        let mut slowest_round = Duration::ZERO;

        for round in 0..self.config.rounds {
            let report = self.run_round(round)?;
            poll_timeouts += report.poll_timeouts;
            slowest_round = slowest_round.max(report.elapsed);
            on_round(&report);
        }

        let actual = self.completed.load(Ordering::Relaxed) - baseline;
        check_total(self.config.rounds, self.config.expected_total(), actual)?;

        Ok(StressReport {
            rounds: self.config.rounds,
            completed: actual,
            poll_timeouts,
            elapsed: start.elapsed(),
            slowest_round,
        })
    }

    /// Runs one round.
    ///
    /// `round` only labels reports and violations; rounds may run in any
    /// order.
    ///
    /// # Errors
    ///
    /// Returns a [`Violation`] if the queue was not empty on entry or exit,
    /// the barrier opened with missing arrivals, or the round executed a
    /// different number of work tasks than it enqueued.
    ///
    /// # Panics
    ///
    /// Panics if a consumer thread cannot be spawned. Consumers already
    /// started are stopped and joined first.
    pub fn run_round(&mut self, round: usize) -> Result<RoundReport, Violation> {
        let start = Instant::now();
        let workers = self.config.workers;
        let work_items = self.config.work_items;

        self.check_drained(round)?;
        let before = self.completed.load(Ordering::Relaxed);

        let state = Arc::new(RoundState {
            stop_requested: AtomicBool::new(false),
            arrivals: AtomicUsize::new(0),
            poll_timeouts: AtomicU64::new(0),
        });

        let spawned = {
            let queue = Arc::clone(&self.queue);
            let completed = Arc::clone(&self.completed);
            let state = Arc::clone(&state);
            let poll = self.config.poll_interval;
            ThreadGroup::try_with_name(CONSUMER_NAME, workers, move |worker| {
                consume(&queue, &completed, &state, poll, round, worker);
            })
        };
        let group = match spawned {
            Ok(group) => group,
            Err(e) => {
                // The partial group joins on drop; its consumers must see the
                // stop flag first
                state.stop_requested.store(true, Ordering::Relaxed);
                panic!("round {round}: {e}");
            }
        };

        for _ in 0..work_items {
            self.queue.enqueue(Task::Work);
        }

        let barrier = WaitGroup::new();
        for _ in 0..workers {
            self.queue.enqueue(Task::Rendezvous(barrier.clone()));
        }
        barrier.wait();

        state.stop_requested.store(true, Ordering::Relaxed);
        drop(group);

        // Joined: every consumer write is visible from here on
        let tally = RoundTally {
            arrivals: state.arrivals.load(Ordering::Relaxed),
            executed: self.completed.load(Ordering::Relaxed) - before,
            remaining: self.queue.len(),
        };
        tally.check(round, workers, work_items)?;

        Ok(RoundReport {
            round,
            executed: tally.executed,
            poll_timeouts: state.poll_timeouts.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        })
    }

    /// Returns the configuration.
    #[inline]
    pub const fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Returns the queue shared by all rounds.
    #[inline]
    pub const fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Returns the number of work tasks executed so far, over all rounds.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    fn check_drained(&self, round: usize) -> Result<(), Violation> {
        match self.queue.len() {
            0 => Ok(()),
            remaining => Err(Violation::Leftover { round, remaining }),
        }
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}

/// What a finished round observed once its consumers were joined.
#[derive(Debug, Clone, Copy)]
struct RoundTally {
    arrivals: usize,
    executed: u64,
    remaining: usize,
}

impl RoundTally {
    /// Checks the tally against what the round put in: barrier first, then
    /// the work count, then leftovers.
    fn check(&self, round: usize, workers: usize, work_items: usize) -> Result<(), Violation> {
        if self.arrivals != workers {
            return Err(Violation::BarrierIncomplete {
                round,
                arrivals: self.arrivals,
                expected: workers,
            });
        }

        let expected = work_items as u64;
        if self.executed != expected {
            return Err(Violation::RoundCount {
                round,
                expected,
                actual: self.executed,
            });
        }

        match self.remaining {
            0 => Ok(()),
            remaining => Err(Violation::Leftover { round, remaining }),
        }
    }
}

fn check_total(rounds: usize, expected: u64, actual: u64) -> Result<(), Violation> {
    if actual == expected {
        Ok(())
    } else {
        Err(Violation::TotalCount {
            rounds,
            expected,
            actual,
        })
    }
}

/// Consumer loop: poll the queue until the round is stopped.
fn consume(
    queue: &TaskQueue,
    completed: &AtomicU64,
    state: &RoundState,
    poll: Duration,
    round: usize,
    worker: usize,
) {
    let _guard = AbortOnPanic { round, worker };

    while !state.stop_requested.load(Ordering::Relaxed) {
        match queue.try_dequeue_for(poll) {
            Some(task) => task.execute(completed, &state.arrivals),
            None => {
                state.poll_timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Turns a consumer panic into a process abort.
///
/// A consumer only panics on a broken queue invariant. Its round can never
/// finish (its rendezvous would be missing from the barrier), so the run
/// stops here with the round and worker that hit it.
struct AbortOnPanic {
    round: usize,
    worker: usize,
}

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            eprintln!(
                "round {}: consumer {} hit a queue protocol violation; aborting",
                self.round, self.worker
            );
            process::abort();
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one clean round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Round index.
    pub round: usize,
    /// Work tasks executed.
    pub executed: u64,
    /// Dequeue attempts that timed out with nothing to take.
    pub poll_timeouts: u64,
    /// Wall time from spawning consumers to the final checks.
    pub elapsed: Duration,
}

/// Outcome of a clean run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    /// Rounds run.
    pub rounds: usize,
    /// Work tasks executed over all rounds.
    pub completed: u64,
    /// Dequeue timeouts over all rounds.
    pub poll_timeouts: u64,
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// Longest single round.
    pub slowest_round: Duration,
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rounds, {} work tasks completed, {} poll timeouts, {:.2?} total, slowest round {:.2?}",
            self.rounds, self.completed, self.poll_timeouts, self.elapsed, self.slowest_round
        )
    }
}
