//! `servotune`: adaptive bandit tuning for serving configurations.
//!
//! Designed for the "which configuration should the next unit of work run
//! under?" problem: you have a small set of candidate `(batch, workers)`
//! configurations — *arms* — and every executed request yields an observed
//! latency.  `servotune` treats negative latency as reward, learns per-arm
//! quality online, and steers future work toward the fastest configuration
//! while continuing to explore.
//!
//! A [`Controller`] owns the whole loop:
//!
//! ```text
//! select_arm() ──► execute (your code, outside the lock) ──► update(arm, latency)
//!                                                        └─► window.observe(batch)
//! ```
//!
//! **Goals:**
//! - **Deterministic by default**: all policies run on a seedable RNG with a
//!   fixed default seed — same config + same latency stream → same choices.
//! - **Shared-state safe**: one controller instance serves concurrent callers;
//!   selection and reward accounting are short critical sections behind a
//!   single lock, and the (possibly slow) executor call runs outside it.
//! - **Small K**: designed for a handful of candidate configurations, not
//!   hundreds.
//!
//! **Selection policies** (switchable at runtime via [`Controller::set_policy`]):
//! - [`Policy::EpsilonGreedy`]: explore with probability `epsilon`, otherwise
//!   exploit the best observed mean reward.
//! - [`Policy::Ucb1`]: optimism under uncertainty — untried arms score
//!   infinite, so every arm is sampled at least once before statistics rule.
//! - [`Policy::Thompson`]: Gaussian Thompson sampling over per-arm mean and
//!   variance estimates.
//!
//! **Derived gauges:** a wall-clock [`MetricsWindow`] aggregates completed
//! request volume and, each time the window closes, republishes utilization
//! percent and cost per 1,000 requests.  Within a window the previously
//! published gauges stay visible — staleness there is deliberate.
//!
//! **Non-goals:** no HTTP surface, no metrics transport (the values are
//! exposed, shipping them is the caller's concern), no opinion about what the
//! executor actually runs.
//!
//! # Example
//!
//! ```rust
//! use servotune::{Arm, Controller, ControllerConfig, ExecError};
//!
//! let ctl = Controller::new(ControllerConfig::default()).unwrap();
//!
//! // A toy executor: larger batches amortize better.
//! let exec = |arm: Arm| -> Result<f64, ExecError> {
//!     Ok(20.0 / arm.batch as f64 + 2.0)
//! };
//!
//! let report = ctl.run_auto(&exec, 12);
//! assert_eq!(report.observations.len(), 12);
//! assert_eq!(report.failed_trials, 0);
//!
//! let snap = ctl.snapshot();
//! let total: u64 = snap.arms.iter().map(|a| a.trials).sum();
//! assert_eq!(total, 12);
//! ```

#![forbid(unsafe_code)]

mod controller;
pub use controller::*;

mod error;
pub use error::*;

mod policy;
pub use policy::*;

mod stats;
pub use stats::*;

mod window;
pub use window::*;

/// One candidate serving configuration a policy can choose.
///
/// Arms are plain values: compared, hashed, and looked up structurally, never
/// by identity or by a stringified key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arm {
    /// Requests executed together per unit of work.
    pub batch: u32,
    /// Parallel workers assigned to the unit of work.
    pub workers: u32,
}

impl Arm {
    /// Create an arm, rejecting non-positive dimensions.
    pub fn new(batch: u32, workers: u32) -> Result<Self, Error> {
        if batch == 0 || workers == 0 {
            return Err(Error::InvalidArm { batch, workers });
        }
        Ok(Self { batch, workers })
    }
}

impl std::fmt::Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}w{}", self.batch, self.workers)
    }
}

/// The default candidate set: small single-worker batches up to a 16-wide
/// two-worker configuration.
pub fn default_arms() -> Vec<Arm> {
    vec![
        Arm { batch: 1, workers: 1 },
        Arm { batch: 4, workers: 1 },
        Arm { batch: 8, workers: 2 },
        Arm { batch: 16, workers: 2 },
    ]
}

/// An ordered set of distinct arms.
///
/// Order matters: every deterministic tie-break in the crate resolves to the
/// earliest registry position.  The registry is immutable after construction
/// and safe to read from any thread.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmRegistry {
    arms: Vec<Arm>,
}

impl ArmRegistry {
    /// Build a registry from an ordered list of arms.
    ///
    /// Fails with [`Error::EmptyRegistry`] on an empty list,
    /// [`Error::InvalidArm`] on a zero dimension, and [`Error::DuplicateArm`]
    /// on a repeated value — a duplicate would make the earliest-position
    /// tie-break ambiguous.
    pub fn new(arms: Vec<Arm>) -> Result<Self, Error> {
        if arms.is_empty() {
            return Err(Error::EmptyRegistry);
        }
        for (i, a) in arms.iter().enumerate() {
            if a.batch == 0 || a.workers == 0 {
                return Err(Error::InvalidArm {
                    batch: a.batch,
                    workers: a.workers,
                });
            }
            if arms[..i].contains(a) {
                return Err(Error::DuplicateArm(*a));
            }
        }
        Ok(Self { arms })
    }

    /// Number of arms.
    pub fn len(&self) -> usize {
        self.arms.len()
    }

    /// Whether the registry is empty (never true for a constructed registry).
    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    /// Arm at a registry position.  Panics on an out-of-range index; indices
    /// flowing through the crate always originate from this registry.
    pub fn get(&self, idx: usize) -> Arm {
        self.arms[idx]
    }

    /// Registry position of an arm, by value.
    pub fn position(&self, arm: Arm) -> Option<usize> {
        self.arms.iter().position(|a| *a == arm)
    }

    /// Iterate arms in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arm> + '_ {
        self.arms.iter()
    }
}
