//! Error types for stress runs.

use core::fmt;
use std::io;

use crate::ThreadGroup;

/// A harness invariant that did not hold.
///
/// Every variant names the round it was detected in, so the failure can be
/// lined up with the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// The queue held items at a round boundary.
    Leftover {
        /// Round the leftover was detected in.
        round: usize,
        /// Items still resident.
        remaining: usize,
    },

    /// The barrier released with fewer consumer arrivals than consumers.
    BarrierIncomplete {
        /// Round the barrier belonged to.
        round: usize,
        /// Consumers that actually arrived.
        arrivals: usize,
        /// Consumers that should have arrived.
        expected: usize,
    },

    /// A round executed a different number of work tasks than it enqueued.
    RoundCount {
        /// Round that miscounted.
        round: usize,
        /// Work tasks enqueued.
        expected: u64,
        /// Work tasks executed.
        actual: u64,
    },

    /// The grand total of executed work tasks is off after all rounds.
    TotalCount {
        /// Rounds that were run.
        rounds: usize,
        /// Work tasks enqueued over all rounds.
        expected: u64,
        /// Work tasks executed over all rounds.
        actual: u64,
    },
}

impl Violation {
    /// Returns the round the violation was detected in, if it belongs to one.
    pub const fn round(&self) -> Option<usize> {
        match self {
            Self::Leftover { round, .. }
            | Self::BarrierIncomplete { round, .. }
            | Self::RoundCount { round, .. } => Some(*round),
            Self::TotalCount { .. } => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leftover { round, remaining } => {
                write!(f, "round {round}: {remaining} item(s) left in queue")
            }
            Self::BarrierIncomplete {
                round,
                arrivals,
                expected,
            } => write!(
                f,
                "round {round}: barrier released after {arrivals} of {expected} consumer arrivals"
            ),
            Self::RoundCount {
                round,
                expected,
                actual,
            } => write!(
                f,
                "round {round}: executed {actual} work tasks, enqueued {expected}"
            ),
            Self::TotalCount {
                rounds,
                expected,
                actual,
            } => write!(
                f,
                "after {rounds} rounds: executed {actual} work tasks, enqueued {expected}"
            ),
        }
    }
}

impl std::error::Error for Violation {}

/// Error returned by [`ThreadGroup::try_with_name`] when the OS refuses a
/// thread.
///
/// Holds the threads that did start. They are joined when the error is
/// dropped, so anything they wait on has to be released first.
#[derive(Debug)]
pub struct SpawnError {
    /// Name of the thread that could not be created.
    pub name: String,
    /// Threads started before the failure.
    pub started: ThreadGroup,
    /// The OS error.
    pub source: io::Error,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to spawn {}: {}", self.name, self.source)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
