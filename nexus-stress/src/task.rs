//! Payload carried through the queue during a stress round.

use core::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::sync::WaitGroup;
use nexus_bounded::BoundedBlockingQueue;

/// The queue type a stress round runs against.
pub type TaskQueue = BoundedBlockingQueue<Task>;

/// A unit of work handed to a consumer.
///
/// The set of task kinds is closed, so a consumer can never pull an empty or
/// unset callable out of the queue.
pub enum Task {
    /// Ordinary work: counts one completion.
    Work,
    /// Round barrier arrival. The consumer that runs it blocks until every
    /// party of the round has arrived.
    Rendezvous(WaitGroup),
}

impl Task {
    /// Runs the task.
    ///
    /// `completed` is bumped for [`Task::Work`]. `arrivals` is bumped for
    /// [`Task::Rendezvous`] before the consumer blocks on the barrier.
    pub fn execute(self, completed: &AtomicU64, arrivals: &AtomicUsize) {
        match self {
            Self::Work => {
                // Only read after every consumer is joined
                completed.fetch_add(1, Ordering::Relaxed);
            }
            Self::Rendezvous(barrier) => {
                arrivals.fetch_add(1, Ordering::Relaxed);
                barrier.wait();
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Work => f.write_str("Work"),
            Self::Rendezvous(_) => f.write_str("Rendezvous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn work_counts_completion() {
        let completed = AtomicU64::new(0);
        let arrivals = AtomicUsize::new(0);

        Task::Work.execute(&completed, &arrivals);
        Task::Work.execute(&completed, &arrivals);

        assert_eq!(completed.load(Ordering::Relaxed), 2);
        assert_eq!(arrivals.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn rendezvous_waits_for_all_parties() {
        let barrier = WaitGroup::new();
        let arrivals = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let task = Task::Rendezvous(barrier.clone());
                let arrivals = Arc::clone(&arrivals);
                let completed = Arc::clone(&completed);
                thread::spawn(move || task.execute(&completed, &arrivals))
            })
            .collect();

        barrier.wait();
        assert_eq!(arrivals.load(Ordering::SeqCst), 3);

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_names_kind() {
        assert_eq!(format!("{:?}", Task::Work), "Work");
        assert_eq!(format!("{:?}", Task::Rendezvous(WaitGroup::new())), "Rendezvous");
    }
}
