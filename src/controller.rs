//! Stateful tuning controller: the front door for most deployments.
//!
//! [`Controller`] owns the policy engine and the metrics window behind one
//! lock and exposes the full decision loop:
//!
//! ```text
//! let obs = ctl.run_once(&executor)?;   // select → execute → record
//! let report = ctl.run_auto(&executor, 20);
//! ```
//!
//! The critical sections are intentionally tiny — select an arm, record a
//! reward, bump the window — and the executor (the expensive part: actual
//! inference) always runs *outside* the lock, so one slow call never stalls
//! another caller's selection.  A shared `Controller` therefore supports
//! concurrent `run_once`/`run_auto` callers without lost updates.

use parking_lot::Mutex;

use crate::{
    default_arms, Arm, ArmRegistry, Error, ExecError, Gauges, MetricsWindow, Policy,
    PolicyEngine, PolicySnapshot, StatsConfig, WindowConfig,
};

/// The execution collaborator: given an arm, run the work and report the
/// observed latency in milliseconds.
///
/// The controller treats it as an opaque black box that may be called
/// repeatedly and concurrently.  Failures (including deadline overruns) make
/// the trial a skipped observation — no reward, no window update.
pub trait Executor {
    /// Execute one unit of work under `arm`'s configuration.
    fn execute(&self, arm: Arm) -> Result<f64, ExecError>;
}

impl<F> Executor for F
where
    F: Fn(Arm) -> Result<f64, ExecError>,
{
    fn execute(&self, arm: Arm) -> Result<f64, ExecError> {
        self(arm)
    }
}

/// How the executed arm was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionSource {
    /// The policy engine chose the arm.
    Chosen(Policy),
    /// The caller supplied the arm explicitly.
    Manual,
}

/// One completed trial, carrying the values an external monitoring sink
/// would publish.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    /// The configuration the work ran under.
    pub arm: Arm,
    /// Observed latency in milliseconds.
    pub latency_ms: f64,
    /// Utilization gauge as of this trial (stale within an open window).
    pub utilization_percent: f64,
    /// Cost-per-1,000-requests gauge as of this trial.
    pub cost_per_1k: f64,
    /// Whether the policy or the caller picked the arm.
    pub source: SelectionSource,
}

/// Result of [`Controller::run_auto`]: the per-trial observations, the number
/// of failed (skipped) trials, and a final engine snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AutoReport {
    /// Successful trials, in order.
    pub observations: Vec<Observation>,
    /// Trials whose executor call failed; excluded from all reward and
    /// window accounting.
    pub failed_trials: u32,
    /// Engine state after the last trial.
    pub snapshot: PolicySnapshot,
}

/// Constructor-injected configuration for a [`Controller`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Candidate arms, in tie-break order.
    pub arms: Vec<Arm>,
    /// Initial selection policy.
    pub policy: Policy,
    /// Exploration probability for epsilon-greedy (fixed at construction).
    pub epsilon: f64,
    /// RNG seed for the policy engine.
    pub seed: u64,
    /// Estimator sentinel overrides.
    pub stats: StatsConfig,
    /// Metrics window tunables.
    pub window: WindowConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            arms: default_arms(),
            policy: Policy::Ucb1,
            epsilon: 0.2,
            seed: 0,
            stats: StatsConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Replace the candidate arm set.
    pub fn with_arms(mut self, arms: Vec<Arm>) -> Self {
        self.arms = arms;
        self
    }

    /// Set the initial policy.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the epsilon-greedy exploration probability.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the engine RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

struct Inner {
    engine: PolicyEngine,
    window: MetricsWindow,
}

/// Adaptive tuning controller.
///
/// All mutation of policy state, reward statistics, and the metrics window
/// happens through this type, behind a single mutex.  The registry itself is
/// immutable after construction.
pub struct Controller {
    inner: Mutex<Inner>,
}

impl Controller {
    /// Build a controller, validating the arm registry.
    ///
    /// Fails with [`Error::EmptyRegistry`], [`Error::InvalidArm`], or
    /// [`Error::DuplicateArm`]; a controller never exists over an invalid
    /// registry.
    pub fn new(cfg: ControllerConfig) -> Result<Self, Error> {
        let registry = ArmRegistry::new(cfg.arms)?;
        let engine =
            PolicyEngine::with_seed(registry, cfg.policy, cfg.epsilon, cfg.stats, cfg.seed);
        Ok(Self {
            inner: Mutex::new(Inner {
                engine,
                window: MetricsWindow::new(cfg.window),
            }),
        })
    }

    /// One automatic trial: select an arm, execute, record the result.
    ///
    /// Executor failure propagates and records nothing for the trial.
    pub fn run_once<E: Executor>(&self, executor: &E) -> Result<Observation, ExecError> {
        let (arm, policy) = {
            let mut inner = self.inner.lock();
            (inner.engine.select_arm(), inner.engine.policy())
        };
        // The expensive call happens with the lock released.
        let latency_ms = executor.execute(arm)?;
        let gauges = self.record(arm, latency_ms);
        Ok(Observation {
            arm,
            latency_ms,
            utilization_percent: gauges.utilization_percent,
            cost_per_1k: gauges.cost_per_1k,
            source: SelectionSource::Chosen(policy),
        })
    }

    /// One manual trial: the caller picks the arm, selection is bypassed.
    ///
    /// Bookkeeping continues regardless of who chose the arm: the reward is
    /// recorded (when `arm` is in the registry) and the window advances.
    pub fn run_manual<E: Executor>(
        &self,
        executor: &E,
        arm: Arm,
    ) -> Result<Observation, ExecError> {
        let latency_ms = executor.execute(arm)?;
        let gauges = self.record(arm, latency_ms);
        Ok(Observation {
            arm,
            latency_ms,
            utilization_percent: gauges.utilization_percent,
            cost_per_1k: gauges.cost_per_1k,
            source: SelectionSource::Manual,
        })
    }

    /// Run `trials` automatic iterations.
    ///
    /// A failed trial is logged, counted, and skipped — it contributes no
    /// reward and no window volume, and it never aborts the remaining trials.
    pub fn run_auto<E: Executor>(&self, executor: &E, trials: u32) -> AutoReport {
        let mut observations = Vec::with_capacity(trials as usize);
        let mut failed_trials = 0u32;
        for trial in 0..trials {
            match self.run_once(executor) {
                Ok(obs) => observations.push(obs),
                Err(err) => {
                    log::warn!("trial {trial}: execution failed, skipping: {err}");
                    failed_trials += 1;
                }
            }
        }
        AutoReport {
            observations,
            failed_trials,
            snapshot: self.snapshot(),
        }
    }

    fn record(&self, arm: Arm, latency_ms: f64) -> Gauges {
        let mut inner = self.inner.lock();
        inner.engine.update(arm, latency_ms);
        inner.window.observe(arm.batch);
        inner.window.gauges()
    }

    /// Consistent view of the engine state.
    pub fn snapshot(&self) -> PolicySnapshot {
        self.inner.lock().engine.snapshot()
    }

    /// Currently published window gauges.
    pub fn gauges(&self) -> Gauges {
        self.inner.lock().window.gauges()
    }

    /// Enable or disable selection; returns the post-mutation snapshot.
    pub fn set_enabled(&self, enabled: bool) -> PolicySnapshot {
        let mut inner = self.inner.lock();
        inner.engine.set_enabled(enabled);
        inner.engine.snapshot()
    }

    /// Switch the selection policy; returns the post-mutation snapshot.
    pub fn set_policy(&self, policy: Policy) -> PolicySnapshot {
        let mut inner = self.inner.lock();
        inner.engine.set_policy(policy);
        inner.engine.snapshot()
    }

    /// Switch the selection policy by wire token.
    ///
    /// An unrecognized token is rejected with [`Error::InvalidPolicy`] and
    /// leaves the engine untouched.
    pub fn set_policy_token(&self, token: &str) -> Result<PolicySnapshot, Error> {
        let policy: Policy = token.parse()?;
        Ok(self.set_policy(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_latency(ms: f64) -> impl Fn(Arm) -> Result<f64, ExecError> {
        move |_arm| Ok(ms)
    }

    #[test]
    fn construction_rejects_bad_registries() {
        let empty = ControllerConfig::default().with_arms(vec![]);
        assert!(matches!(Controller::new(empty), Err(Error::EmptyRegistry)));

        let zero = ControllerConfig::default().with_arms(vec![Arm { batch: 0, workers: 1 }]);
        assert!(matches!(Controller::new(zero), Err(Error::InvalidArm { .. })));
    }

    #[test]
    fn run_once_records_exactly_one_trial() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let obs = ctl.run_once(&fixed_latency(42.0)).unwrap();
        assert_eq!(obs.latency_ms, 42.0);
        assert_eq!(obs.source, SelectionSource::Chosen(Policy::Ucb1));
        let snap = ctl.snapshot();
        let total: u64 = snap.arms.iter().map(|a| a.trials).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn failed_execution_records_nothing() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let failing =
            |_arm: Arm| -> Result<f64, ExecError> { Err(ExecError::Failed("boom".into())) };
        assert!(ctl.run_once(&failing).is_err());
        let snap = ctl.snapshot();
        assert!(snap.arms.iter().all(|a| a.trials == 0));
        // t advanced (a selection happened) but no reward was fabricated.
        assert_eq!(snap.t, 1);
    }

    #[test]
    fn run_auto_tolerates_partial_failure() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let counter = std::sync::atomic::AtomicU32::new(0);
        let flaky = |_arm: Arm| -> Result<f64, ExecError> {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            if n % 3 == 2 {
                Err(ExecError::DeadlineExceeded { deadline_ms: 100 })
            } else {
                Ok(25.0)
            }
        };
        let report = ctl.run_auto(&flaky, 9);
        assert_eq!(report.observations.len(), 6);
        assert_eq!(report.failed_trials, 3);
        let total: u64 = report.snapshot.arms.iter().map(|a| a.trials).sum();
        assert_eq!(total, 6, "failed trials must not contribute rewards");
    }

    #[test]
    fn manual_mode_feeds_stats_for_registry_arms() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let arm = Arm { batch: 8, workers: 2 };
        let obs = ctl.run_manual(&fixed_latency(30.0), arm).unwrap();
        assert_eq!(obs.source, SelectionSource::Manual);
        let snap = ctl.snapshot();
        let row = snap.arms.iter().find(|a| a.arm == arm).unwrap();
        assert_eq!(row.trials, 1);
        assert_eq!(row.avg_reward, Some(-30.0));
    }

    #[test]
    fn manual_mode_with_off_registry_arm_still_succeeds() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let arm = Arm { batch: 32, workers: 4 };
        assert!(ctl.run_manual(&fixed_latency(30.0), arm).is_ok());
        let snap = ctl.snapshot();
        assert!(snap.arms.iter().all(|a| a.trials == 0));
    }

    #[test]
    fn admin_ops_return_post_mutation_snapshots() {
        let ctl = Controller::new(ControllerConfig::default()).unwrap();
        let snap = ctl.set_policy(Policy::Thompson);
        assert_eq!(snap.policy, Policy::Thompson);
        let snap = ctl.set_enabled(false);
        assert!(!snap.enabled);
        assert!(matches!(
            ctl.set_policy_token("bogus"),
            Err(Error::InvalidPolicy(_))
        ));
        // Rejected token left the policy untouched.
        assert_eq!(ctl.snapshot().policy, Policy::Thompson);
    }
}
