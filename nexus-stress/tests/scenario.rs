//! Multi-round scenarios against the reference configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use nexus_bounded::BoundedBlockingQueue;
use nexus_stress::{Harness, StressConfig, Task, ThreadGroup};

// =============================================================================
// Reference scenario
// =============================================================================

#[test]
fn reference_scenario_shortened() {
    let config = StressConfig::default().rounds(500);
    let report = Harness::new(config.clone()).run().unwrap();

    assert_eq!(report.rounds, 500);
    assert_eq!(report.completed, 500 * 256);
    assert_eq!(report.completed, config.expected_total());
}

#[test]
#[ignore = "long-running: cargo test --release -p nexus-stress -- --ignored"]
fn reference_scenario_full() {
    let config = StressConfig::default();
    let report = Harness::new(config).run().unwrap();

    assert_eq!(report.rounds, 20_000);
    assert_eq!(report.completed, 5_120_000);
}

// =============================================================================
// Adversarial shapes
// =============================================================================

#[test]
fn capacity_one_many_consumers() {
    let config = StressConfig::default()
        .capacity(1)
        .workers(16)
        .work_items(128)
        .rounds(200)
        .dequeue_delay(None);

    let report = Harness::new(config.clone()).run().unwrap();
    assert_eq!(report.completed, config.expected_total());
}

#[test]
fn more_consumers_than_capacity_and_work() {
    let config = StressConfig::default()
        .capacity(2)
        .workers(12)
        .work_items(4)
        .rounds(300);

    let report = Harness::new(config.clone()).run().unwrap();
    assert_eq!(report.completed, config.expected_total());
}

#[test]
fn fast_polling_consumers() {
    let config = StressConfig::default()
        .poll_interval(Duration::from_micros(10))
        .rounds(300)
        .dequeue_delay(None);

    let report = Harness::new(config.clone()).run().unwrap();
    assert_eq!(report.completed, config.expected_total());
}

#[test]
fn rounds_leave_queue_empty() {
    let mut harness = Harness::new(StressConfig::default().rounds(1).dequeue_delay(None));

    for round in 0..100 {
        harness.run_round(round).unwrap();
        assert!(harness.queue().is_empty(), "round {round} left items behind");
    }
    assert_eq!(harness.completed(), 100 * 256);
}

// =============================================================================
// Queue under a hand-rolled round
// =============================================================================

#[test]
fn thread_group_drains_queue_of_plain_items() {
    const ITEMS: usize = 50_000;

    let queue = Arc::new(BoundedBlockingQueue::<usize>::new(32));
    let seen = Arc::new(AtomicUsize::new(0));
    let sum = Arc::new(AtomicUsize::new(0));

    let group = {
        let queue = Arc::clone(&queue);
        let seen = Arc::clone(&seen);
        let sum = Arc::clone(&sum);
        ThreadGroup::spawn(8, move |_| {
            while seen.load(Ordering::SeqCst) < ITEMS {
                if let Some(v) = queue.try_dequeue_for(Duration::from_millis(1)) {
                    sum.fetch_add(v, Ordering::SeqCst);
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
    };

    for i in 0..ITEMS {
        queue.enqueue(i);
    }

    drop(group);
    assert_eq!(sum.load(Ordering::SeqCst), ITEMS * (ITEMS - 1) / 2);
    assert!(queue.is_empty());
}

#[test]
fn independent_harnesses_do_not_share_counters() {
    let mut a = Harness::new(StressConfig::default().rounds(10).dequeue_delay(None));
    let mut b = Harness::new(StressConfig::default().rounds(10).work_items(16).dequeue_delay(None));

    thread::scope(|s| {
        s.spawn(|| a.run().unwrap());
        s.spawn(|| b.run().unwrap());
    });

    assert_eq!(a.completed(), 10 * 256);
    assert_eq!(b.completed(), 10 * 16);
}

#[test]
fn stray_task_is_caught_at_next_round() {
    let mut harness = Harness::new(StressConfig::default().rounds(1).dequeue_delay(None));
    harness.run_round(0).unwrap();

    harness.queue().enqueue(Task::Work);
    let err = harness.run_round(1).unwrap_err();

    assert_eq!(err.round(), Some(1));
    assert_eq!(err.to_string(), "round 1: 1 item(s) left in queue");
}
