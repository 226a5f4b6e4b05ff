//! Round-based stress harness for [`nexus_bounded`].
//!
//! A queue can pass every unit test and still lose an item once in a few
//! million hand-offs. This crate exists to make those hand-offs happen under
//! as much scheduling pressure as a plain test run can produce, and to notice
//! when one goes wrong.
//!
//! Each round spins up a pool of consumers against one long-lived queue,
//! pushes a burst of work, then one rendezvous task per consumer, and waits
//! on a barrier shared by all consumers and the producer. After the round the
//! harness checks that every work task ran exactly once, that every consumer
//! reached the barrier, and that the queue is empty again. See [`harness`]
//! for the round choreography.
//!
//! # Example
//!
//! ```
//! use nexus_stress::{Harness, StressConfig};
//!
//! let config = StressConfig::default().rounds(20).dequeue_delay(None);
//! let report = Harness::new(config.clone()).run().unwrap();
//!
//! assert_eq!(report.completed, config.expected_total());
//! ```
//!
//! # Failure Modes
//!
//! | What broke | How it surfaces |
//! |------------|-----------------|
//! | Consumer granted an item it cannot see | queue panics, process aborts with round and worker |
//! | Item lost or run twice | [`Violation::RoundCount`] / [`Violation::TotalCount`] |
//! | Rendezvous lost | [`Violation::BarrierIncomplete`] |
//! | Item carried into the next round | [`Violation::Leftover`] |
//!
//! The reference scenario (the [`StressConfig`] default) runs 20 000 rounds
//! of 256 work tasks over 8 consumers and a 32-slot queue. Run it with the
//! `nexus-stress` binary in release mode.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
pub mod harness;
mod task;
mod thread_group;

pub use config::{
    DEFAULT_CAPACITY, DEFAULT_DEQUEUE_DELAY, DEFAULT_POLL_INTERVAL, DEFAULT_ROUNDS,
    DEFAULT_WORK_ITEMS, DEFAULT_WORKERS, StressConfig,
};
pub use error::{SpawnError, Violation};
pub use harness::{Harness, RoundReport, StressReport};
pub use task::{Task, TaskQueue};
pub use thread_group::{DEFAULT_THREAD_NAME, ThreadGroup};
