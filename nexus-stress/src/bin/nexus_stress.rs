//! Runs the reference stress scenario.
//!
//! Exits 0 after a clean run, 1 on a harness violation. A queue protocol
//! violation aborts the process from the consumer that hit it.
//!
//! Run: cargo run --release -p nexus-stress

use std::process::ExitCode;

use nexus_stress::{Harness, StressConfig};

fn main() -> ExitCode {
    let config = StressConfig::default();

    println!(
        "nexus-stress: {} rounds, {} consumers, {} work tasks/round, capacity {}",
        config.rounds, config.workers, config.work_items, config.capacity
    );

    match Harness::new(config).run() {
        Ok(report) => {
            println!("ok: {report}");
            ExitCode::SUCCESS
        }
        Err(violation) => {
            eprintln!("violation: {violation}");
            ExitCode::FAILURE
        }
    }
}
