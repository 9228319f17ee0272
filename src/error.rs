//! Error taxonomy.
//!
//! Construction and administration errors live in [`Error`]; the execution
//! collaborator reports its own failures through [`ExecError`].  Numerical
//! edge cases (log of a zero round counter, degenerate variance, near-zero
//! request rates) are guarded locally in the policy and window code and are
//! never surfaced as errors.

use crate::Arm;

/// Errors from controller construction and administrative operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `set_policy` was given a token that is not `epsilon`, `ucb1`, or
    /// `thompson`.  The engine state is unchanged.
    #[error("unrecognized policy token {0:?} (expected \"epsilon\", \"ucb1\", or \"thompson\")")]
    InvalidPolicy(String),

    /// A controller cannot be built over zero arms.
    #[error("arm registry must contain at least one arm")]
    EmptyRegistry,

    /// Batch size and worker count must both be positive.
    #[error("invalid arm: batch={batch}, workers={workers} (both must be positive)")]
    InvalidArm { batch: u32, workers: u32 },

    /// The same arm value appeared twice in the registry input.
    #[error("duplicate arm in registry: {0}")]
    DuplicateArm(Arm),
}

/// Failure surface of the execution collaborator.
///
/// A failed or timed-out execution is a skipped observation: no reward is
/// recorded and the metrics window is not advanced, so a bad trial can never
/// corrupt the accumulated statistics with a fabricated latency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// The executor failed outright.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The executor exceeded its deadline.  The executor owns the timer; the
    /// controller only needs to know the trial produced no usable latency.
    #[error("execution exceeded its {deadline_ms} ms deadline")]
    DeadlineExceeded { deadline_ms: u64 },
}
