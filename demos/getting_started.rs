//! Getting started — adaptive batch tuning in under 60 lines.
//!
//! No locks to manage, no policy math to write.  Just: create a `Controller`
//! → hand it an executor → let `run_auto` learn which `(batch, workers)`
//! configuration is fastest.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example getting_started

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use servotune::{Arm, Controller, ControllerConfig, ExecError, Policy};
use std::sync::Mutex;

fn main() {
    env_logger::init();

    // -----------------------------------------------------------------
    // 1. Create a controller over the default arm set.
    // -----------------------------------------------------------------
    // ControllerConfig::default() gives you:
    //   - arms (1,1), (4,1), (8,2), (16,2)
    //   - UCB1 selection, deterministic seed
    //   - a 60 s metrics window at 100 rps assumed capacity
    let ctl = Controller::new(ControllerConfig::default().with_policy(Policy::Ucb1)).unwrap();

    // -----------------------------------------------------------------
    // 2. A simulated execution collaborator.
    // -----------------------------------------------------------------
    // Per-request latency improves with batching, with some noise — the
    // 16-wide configuration is genuinely the best arm here.
    let rng = Mutex::new(StdRng::seed_from_u64(7));
    let exec = |arm: Arm| -> Result<f64, ExecError> {
        let noise: f64 = rng.lock().unwrap().random_range(-1.0..1.0);
        Ok(6.0 + 40.0 / arm.batch as f64 + 0.5 * arm.workers as f64 + noise)
    };

    // -----------------------------------------------------------------
    // 3. Let the bandit run.
    // -----------------------------------------------------------------
    let report = ctl.run_auto(&exec, 60);
    println!(
        "ran {} trials ({} failed)",
        report.observations.len(),
        report.failed_trials
    );

    println!("\narm        trials   avg latency (ms)");
    for row in &report.snapshot.arms {
        match row.avg_reward {
            Some(avg) => println!("{:<10} {:>6}   {:>8.2}", row.arm.to_string(), row.trials, -avg),
            None => println!("{:<10} {:>6}   untried", row.arm.to_string(), row.trials),
        }
    }
    println!("\ncurrent arm: {}", report.snapshot.current);
}
