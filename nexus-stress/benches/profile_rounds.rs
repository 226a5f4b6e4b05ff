//! Per-round latency profile for the stress harness.
//!
//! Records the wall time of every round in a histogram and prints the
//! distribution. Useful for spotting rounds that stall on the barrier or on
//! a parked consumer.
//!
//! Run: cargo bench -p nexus-stress --bench profile_rounds

use hdrhistogram::Histogram;
use nexus_stress::{Harness, StressConfig};

const ROUNDS: usize = 2_000;

/// Rounds slower than this are clamped into the top bucket.
const MAX_ROUND_US: u64 = 10_000_000;

fn profile(label: &str, config: StressConfig) {
    let mut hist = Histogram::<u64>::new_with_max(MAX_ROUND_US, 3).unwrap();

    let report = Harness::new(config)
        .run_with(|round| {
            let us = u64::try_from(round.elapsed.as_micros()).unwrap_or(MAX_ROUND_US);
            let _ = hist.record(us.min(MAX_ROUND_US));
        })
        .unwrap();

    println!("{label}");
    println!("  {report}");
    println!("  Round latency (us):");
    println!("  min:   {:>7}", hist.min());
    println!("  p50:   {:>7}", hist.value_at_quantile(0.50));
    println!("  p90:   {:>7}", hist.value_at_quantile(0.90));
    println!("  p99:   {:>7}", hist.value_at_quantile(0.99));
    println!("  p999:  {:>7}", hist.value_at_quantile(0.999));
    println!("  max:   {:>7}", hist.max());
}

fn main() {
    println!("nexus-stress round profile");
    println!("==========================");
    println!();

    let base = StressConfig::default().rounds(ROUNDS);

    profile("reference (500ns dequeue delay)", base.clone());
    println!();
    profile("no dequeue delay", base.clone().dequeue_delay(None));
    println!();
    profile("capacity 1", base.capacity(1).dequeue_delay(None));
}
