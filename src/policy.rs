//! Bandit policies over the reward table.
//!
//! [`PolicyEngine`] owns the arm registry, the per-arm reward statistics, and
//! the mode switch between the three selection strategies.  The policy is not
//! a temporal phase: it is a persistent mode changed only by an explicit
//! administrative call, effective on the next selection.
//!
//! Notes:
//! - The engine is **seedable** so selection is reproducible in tests.
//!   Default construction uses a fixed seed (deterministic by default).
//! - Deterministic tie-breaks always resolve to the earliest registry
//!   position: the argmax scan only replaces the incumbent on a strictly
//!   greater score.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::{Arm, ArmRegistry, Error, StatsConfig, StatsTable};

/// Selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Policy {
    /// Explore uniformly with probability `epsilon`, otherwise exploit the
    /// best observed mean.
    EpsilonGreedy,
    /// UCB1: mean plus an exploration bonus that shrinks with trials; untried
    /// arms score infinite so each is tried at least once.
    #[default]
    Ucb1,
    /// Gaussian Thompson sampling over per-arm mean/variance estimates.
    Thompson,
}

impl Policy {
    /// The wire token for this policy (`epsilon`, `ucb1`, `thompson`).
    pub fn token(&self) -> &'static str {
        match self {
            Policy::EpsilonGreedy => "epsilon",
            Policy::Ucb1 => "ucb1",
            Policy::Thompson => "thompson",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "epsilon" => Ok(Policy::EpsilonGreedy),
            "ucb1" => Ok(Policy::Ucb1),
            "thompson" => Ok(Policy::Thompson),
            other => Err(Error::InvalidPolicy(other.to_string())),
        }
    }
}

/// Read-only projection of one arm's standing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmSnapshot {
    /// The arm.
    pub arm: Arm,
    /// Rewards recorded for this arm.
    pub trials: u64,
    /// Mean reward, or `None` while untried (the internal sentinel never
    /// leaks here).
    pub avg_reward: Option<f64>,
}

/// Consistent read-only view of the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicySnapshot {
    /// Whether selection is live.
    pub enabled: bool,
    /// Active policy.
    pub policy: Policy,
    /// Enabled selections performed so far.
    pub t: u64,
    /// The most recently selected arm (valid even while disabled).
    pub current: Arm,
    /// Per-arm standing, in registry order.
    pub arms: Vec<ArmSnapshot>,
}

/// Stateful policy engine: selection, reward accounting, and the
/// administrative enable/policy switches.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    registry: ArmRegistry,
    stats: StatsTable,
    policy: Policy,
    epsilon: f64,
    enabled: bool,
    t: u64,
    current: usize,
    rng: StdRng,
}

impl PolicyEngine {
    /// Create an engine with the deterministic default seed (0).
    pub fn new(registry: ArmRegistry, policy: Policy, epsilon: f64, stats: StatsConfig) -> Self {
        Self::with_seed(registry, policy, epsilon, stats, 0)
    }

    /// Create an engine with an explicit RNG seed (reproducible).
    pub fn with_seed(
        registry: ArmRegistry,
        policy: Policy,
        epsilon: f64,
        stats: StatsConfig,
        seed: u64,
    ) -> Self {
        let stats = StatsTable::new(registry.len(), stats);
        Self {
            registry,
            stats,
            policy,
            epsilon,
            enabled: true,
            t: 0,
            current: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The registry this engine selects over.
    pub fn registry(&self) -> &ArmRegistry {
        &self.registry
    }

    /// Active policy.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Whether selection is live.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Switch the selection strategy.  Takes effect on the next
    /// [`select_arm`](Self::select_arm) call.
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// Enable or disable selection.  While disabled, `select_arm` returns the
    /// last-chosen arm without consuming a round.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Select the arm for the next unit of work.
    ///
    /// Disabled engines return the current arm unchanged — no round counter
    /// increment, no statistics scan.  Enabled selection bumps `t` and
    /// dispatches on the active policy.
    pub fn select_arm(&mut self) -> Arm {
        if !self.enabled {
            return self.registry.get(self.current);
        }
        self.t += 1;
        let idx = match self.policy {
            Policy::EpsilonGreedy => self.select_epsilon_greedy(),
            Policy::Ucb1 => self.select_ucb1(),
            Policy::Thompson => self.select_thompson(),
        };
        self.current = idx;
        let arm = self.registry.get(idx);
        log::debug!(
            "select: policy={} t={} arm={} trials={}",
            self.policy,
            self.t,
            arm,
            self.stats.get(idx).trials
        );
        arm
    }

    fn select_epsilon_greedy(&mut self) -> usize {
        let u: f64 = self.rng.random();
        if u < self.epsilon {
            return self.rng.random_range(0..self.registry.len());
        }
        let stats = &self.stats;
        argmax(self.registry.len(), |i| stats.mean(i))
    }

    fn select_ucb1(&mut self) -> usize {
        // t was incremented before dispatch, so ln(t) is defined.
        let ln_t = (self.t as f64).ln();
        let stats = &self.stats;
        argmax(self.registry.len(), |i| {
            let row = stats.get(i);
            if row.trials == 0 {
                f64::INFINITY
            } else {
                stats.mean(i) + (2.0 * ln_t / row.trials as f64).sqrt()
            }
        })
    }

    fn select_thompson(&mut self) -> usize {
        let cfg = self.stats.config();
        let mut best = 0usize;
        let mut best_sample = f64::NEG_INFINITY;
        for i in 0..self.registry.len() {
            let row = self.stats.get(i);
            let mu = if row.trials > 0 {
                self.stats.mean(i)
            } else {
                cfg.thompson_prior_mean
            };
            let sd = self.stats.variance(i).max(cfg.variance_floor).sqrt();
            // sd is strictly positive after the floor, so construction cannot
            // fail; fall back to the mean rather than panic regardless.
            let sample = match Normal::new(mu, sd) {
                Ok(dist) => dist.sample(&mut self.rng),
                Err(_) => mu,
            };
            if sample > best_sample {
                best_sample = sample;
                best = i;
            }
        }
        best
    }

    /// Record an observed latency for `arm` as reward `-latency_ms`.
    ///
    /// Arms outside the registry are accepted and ignored: the table is keyed
    /// by registry position, and a reward for an arm no policy can select has
    /// no consumer.
    pub fn update(&mut self, arm: Arm, latency_ms: f64) {
        let Some(idx) = self.registry.position(arm) else {
            log::trace!("update: arm {arm} not in registry, skipping");
            return;
        };
        let reward = -latency_ms;
        self.stats.record(idx, reward);
        log::trace!("update: arm={arm} reward={reward}");
    }

    /// Consistent read-only view of the engine state.
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            enabled: self.enabled,
            policy: self.policy,
            t: self.t,
            current: self.registry.get(self.current),
            arms: (0..self.registry.len())
                .map(|i| ArmSnapshot {
                    arm: self.registry.get(i),
                    trials: self.stats.get(i).trials,
                    avg_reward: self.stats.avg_reward(i),
                })
                .collect(),
        }
    }
}

/// Argmax with strict-greater comparison: the earliest index wins ties.
fn argmax<F>(len: usize, score: F) -> usize
where
    F: Fn(usize) -> f64,
{
    let mut best = 0usize;
    let mut best_score = f64::NEG_INFINITY;
    for i in 0..len {
        let s = score(i);
        if s > best_score {
            best_score = s;
            best = i;
        }
    }
    best
}
