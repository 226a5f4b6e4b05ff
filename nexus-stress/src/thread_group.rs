//! A group of worker threads that is joined when it goes out of scope.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::SpawnError;

/// Default thread name prefix; threads are named `{prefix}-{index}`.
pub const DEFAULT_THREAD_NAME: &str = "nexus-worker";

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of threads all running the same closure.
///
/// Every thread is joined before the group is dropped, on every exit path,
/// including unwinding out of the scope that owns the group. No worker can
/// outlive the state it was handed.
///
/// # Example
///
/// ```
/// use nexus_stress::ThreadGroup;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// {
///     let hits = Arc::clone(&hits);
///     let _group = ThreadGroup::spawn(4, move |_index| {
///         hits.fetch_add(1, Ordering::Relaxed);
///     });
/// } // joined here
///
/// assert_eq!(hits.load(Ordering::Relaxed), 4);
/// ```
pub struct ThreadGroup {
    members: Vec<JoinHandle<()>>,
}

impl ThreadGroup {
    /// Starts `count` threads, each calling `f` with its index in `0..count`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create a thread. See
    /// [`with_name`](Self::with_name).
    pub fn spawn<F>(count: usize, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self::with_name(DEFAULT_THREAD_NAME, count, f)
    }

    /// Like [`spawn`](Self::spawn), naming the threads `{name}-{index}`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create a thread. The threads already
    /// started are joined first, so `f` must return on its own for the panic
    /// to get out. Workers that wait for an outside signal need
    /// [`try_with_name`](Self::try_with_name).
    pub fn with_name<F>(name: &str, count: usize, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self::try_with_name(name, count, f).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`with_name`](Self::with_name), handing a spawn failure back to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the OS refuses to create a thread. The error
    /// owns the threads started so far; they are joined when it is dropped,
    /// so the caller can release them first.
    pub fn try_with_name<F>(name: &str, count: usize, f: F) -> Result<Self, SpawnError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self::spawn_with(name, count, f, |builder, job| builder.spawn(job))
    }

    fn spawn_with<F, S>(name: &str, count: usize, f: F, mut spawn: S) -> Result<Self, SpawnError>
    where
        F: Fn(usize) + Send + Sync + 'static,
        S: FnMut(thread::Builder, Job) -> io::Result<JoinHandle<()>>,
    {
        let f = Arc::new(f);
        let mut group = Self {
            members: Vec::with_capacity(count),
        };

        for index in 0..count {
            let f = Arc::clone(&f);
            let builder = thread::Builder::new().name(format!("{name}-{index}"));
            match spawn(builder, Box::new(move || f(index))) {
                Ok(handle) => group.members.push(handle),
                Err(source) => {
                    return Err(SpawnError {
                        name: format!("{name}-{index}"),
                        started: group,
                        source,
                    });
                }
            }
        }

        Ok(group)
    }

    /// Returns the number of threads in the group.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the group has no threads.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Drop for ThreadGroup {
    fn drop(&mut self) {
        // A worker's panic was already reported on its own stderr; dropping
        // only guarantees the join.
        for handle in self.members.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn runs_closure_once_per_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            let group = ThreadGroup::spawn(6, move |i| seen.lock().unwrap().push(i));
            assert_eq!(group.len(), 6);
        }

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_group() {
        let group = ThreadGroup::spawn(0, |_| unreachable!());
        assert!(group.is_empty());
    }

    #[test]
    fn threads_are_named() {
        let names = Arc::new(Mutex::new(Vec::new()));

        {
            let names = Arc::clone(&names);
            let _group = ThreadGroup::with_name("round", 2, move |_| {
                let name = thread::current().name().map(str::to_owned);
                names.lock().unwrap().push(name);
            });
        }

        let mut names = names.lock().unwrap().clone();
        names.sort();
        assert_eq!(
            names,
            vec![Some("round-0".to_string()), Some("round-1".to_string())]
        );
    }

    #[test]
    fn drop_waits_for_every_thread() {
        let finished = Arc::new(AtomicUsize::new(0));

        {
            let finished = Arc::clone(&finished);
            let _group = ThreadGroup::spawn(4, move |_| {
                thread::sleep(Duration::from_millis(30));
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn drop_joins_during_unwind() {
        let stop = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicUsize::new(0));

        let result = {
            let stop = Arc::clone(&stop);
            let exited = Arc::clone(&exited);
            thread::spawn(move || {
                let worker_stop = Arc::clone(&stop);
                let worker_exited = Arc::clone(&exited);
                let _group = ThreadGroup::spawn(3, move |_| {
                    while !worker_stop.load(Ordering::SeqCst) {
                        thread::yield_now();
                    }
                    worker_exited.fetch_add(1, Ordering::SeqCst);
                });

                // Workers must be released before the group can join them
                stop.store(true, Ordering::SeqCst);
                panic!("scope failed");
            })
            .join()
        };

        assert!(result.is_err());
        assert_eq!(exited.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_worker_does_not_poison_drop() {
        let group = ThreadGroup::spawn(4, |i| {
            assert!(i % 2 == 0, "odd worker {i}");
        });
        drop(group);
    }

    // ============================================================================
    // Spawn Failure
    // ============================================================================

    #[test]
    fn spawn_failure_hands_back_started_threads() {
        let stop = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicUsize::new(0));

        let worker = {
            let stop = Arc::clone(&stop);
            let exited = Arc::clone(&exited);
            move |_: usize| {
                while !stop.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                exited.fetch_add(1, Ordering::SeqCst);
            }
        };

        let mut started = 0;
        let result = ThreadGroup::spawn_with("limited", 5, worker, |builder, job| {
            if started == 2 {
                return Err(io::Error::other("thread limit reached"));
            }
            started += 1;
            builder.spawn(job)
        });

        let err = result.unwrap_err();
        assert_eq!(err.started.len(), 2);
        assert_eq!(
            err.to_string(),
            "failed to spawn limited-2: thread limit reached"
        );

        // Nothing was joined yet: the workers are still waiting for the flag
        assert_eq!(exited.load(Ordering::SeqCst), 0);

        stop.store(true, Ordering::SeqCst);
        drop(err);
        assert_eq!(exited.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "failed to spawn refused-0")]
    fn spawn_failure_panic_names_thread() {
        let _ = ThreadGroup::spawn_with("refused", 1, |_| {}, |_, _| {
            Err(io::Error::other("no threads"))
        })
        .unwrap_or_else(|e| panic!("{e}"));
    }
}
