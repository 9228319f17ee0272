//! Per-arm reward accounting.
//!
//! A [`StatsTable`] keeps one [`ArmStats`] row per registry position — trials,
//! reward sum, squared-reward sum — and derives the mean and variance
//! estimates every policy consumes.  Rewards follow the crate-wide sign
//! convention: `reward = -latency_ms`, so maximizing reward minimizes latency
//! and all three policies share one argmax-shaped selection path.

/// Named defaults for the estimator sentinels.
///
/// Overridable, but the defaults are load-bearing: an untried arm reports a
/// very low but finite mean so max-based selection
/// still terminates, and Thompson sampling stays wide before enough data
/// exists.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsConfig {
    /// Mean reported for an arm with zero trials.  Strictly lower than any
    /// attainable real reward, so untried arms lose greedy ties to any arm
    /// with data.
    pub unknown_mean: f64,
    /// Variance used while `trials <= 1` (keeps Thompson exploratory early).
    pub default_variance: f64,
    /// Thompson prior mean for an untried arm.
    pub thompson_prior_mean: f64,
    /// Floor applied to variance before taking a standard deviation, so a
    /// zero- or negative-variance estimate never degenerates the draw.
    pub variance_floor: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            unknown_mean: -9999.0,
            default_variance: 25.0,
            thompson_prior_mean: -50.0,
            variance_floor: 1e-6,
        }
    }
}

/// Running statistics for one arm.
///
/// Append-only: rows grow through [`StatsTable::record`] and are never
/// decremented or reset (discarding statistics means discarding the whole
/// controller).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmStats {
    /// Number of recorded rewards.
    pub trials: u64,
    /// Sum of rewards.
    pub reward_sum: f64,
    /// Sum of squared rewards.
    pub reward_sq_sum: f64,
}

/// Reward table indexed by registry position.
#[derive(Debug, Clone)]
pub struct StatsTable {
    rows: Vec<ArmStats>,
    cfg: StatsConfig,
}

impl StatsTable {
    /// Create a zeroed table for `len` arms.
    pub fn new(len: usize, cfg: StatsConfig) -> Self {
        Self {
            rows: vec![ArmStats::default(); len],
            cfg,
        }
    }

    /// The sentinel configuration this table derives estimates with.
    pub fn config(&self) -> StatsConfig {
        self.cfg
    }

    /// Raw row for an arm.
    pub fn get(&self, idx: usize) -> ArmStats {
        self.rows[idx]
    }

    /// Record one reward for the arm at `idx`.
    pub fn record(&mut self, idx: usize, reward: f64) {
        let row = &mut self.rows[idx];
        row.trials += 1;
        row.reward_sum += reward;
        row.reward_sq_sum += reward * reward;
    }

    /// Mean reward, or the `unknown_mean` sentinel for an untried arm.
    pub fn mean(&self, idx: usize) -> f64 {
        let row = self.rows[idx];
        if row.trials > 0 {
            row.reward_sum / row.trials as f64
        } else {
            self.cfg.unknown_mean
        }
    }

    /// Mean reward for external observers: `None` for an untried arm, never
    /// the internal sentinel.
    pub fn avg_reward(&self, idx: usize) -> Option<f64> {
        let row = self.rows[idx];
        if row.trials > 0 {
            Some(row.reward_sum / row.trials as f64)
        } else {
            None
        }
    }

    /// Reward variance, or `default_variance` while fewer than two trials
    /// exist.
    pub fn variance(&self, idx: usize) -> f64 {
        let row = self.rows[idx];
        if row.trials > 1 {
            let mean = row.reward_sum / row.trials as f64;
            row.reward_sq_sum / row.trials as f64 - mean * mean
        } else {
            self.cfg.default_variance
        }
    }

    /// Number of arms in the table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untried_arm_reports_sentinel_mean_but_none_avg() {
        let t = StatsTable::new(2, StatsConfig::default());
        assert_eq!(t.mean(0), -9999.0);
        assert_eq!(t.avg_reward(0), None);
        assert_eq!(t.get(0).trials, 0);
    }

    #[test]
    fn record_accumulates_sums() {
        let mut t = StatsTable::new(1, StatsConfig::default());
        t.record(0, -120.0);
        t.record(0, -80.0);
        let row = t.get(0);
        assert_eq!(row.trials, 2);
        assert_eq!(row.reward_sum, -200.0);
        assert_eq!(row.reward_sq_sum, 120.0 * 120.0 + 80.0 * 80.0);
        assert_eq!(t.mean(0), -100.0);
        assert_eq!(t.avg_reward(0), Some(-100.0));
    }

    #[test]
    fn variance_uses_default_until_two_trials() {
        let mut t = StatsTable::new(1, StatsConfig::default());
        assert_eq!(t.variance(0), 25.0);
        t.record(0, -10.0);
        assert_eq!(t.variance(0), 25.0);
        t.record(0, -20.0);
        // E[x^2] - E[x]^2 = (100+400)/2 - 225 = 25.
        assert!((t.variance(0) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn sentinel_defaults_are_overridable() {
        let cfg = StatsConfig {
            unknown_mean: -1.0,
            default_variance: 4.0,
            ..StatsConfig::default()
        };
        let t = StatsTable::new(1, cfg);
        assert_eq!(t.mean(0), -1.0);
        assert_eq!(t.variance(0), 4.0);
    }
}
