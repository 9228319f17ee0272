//! Windowed throughput gauges.
//!
//! Raw request counts are aggregated over a fixed wall-clock window and
//! converted into two derived gauges — utilization percent and cost per 1,000
//! requests — only when the window closes.  Recomputing per request would make
//! the gauges fluctuate at request granularity; between closures the
//! previously published values stay visible, and both gauges read 0.0 until
//! the first window has actually elapsed.

use std::time::Instant;

/// Tunables for the metrics window.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowConfig {
    /// Window length in seconds.
    pub window_secs: f64,
    /// Assumed maximum sustainable request rate, used as the utilization
    /// denominator.
    pub capacity_rps: f64,
    /// Cost per compute-hour in dollars.
    pub hourly_cost: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: 60.0,
            capacity_rps: 100.0,
            hourly_cost: 0.04,
        }
    }
}

/// Floor for the thousands-of-requests-per-hour denominator, so a near-idle
/// window cannot divide by zero.
const RATE_EPS: f64 = 1e-6;

/// The two published gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gauges {
    /// Share of assumed capacity consumed, clamped to `[0, 100]`.
    pub utilization_percent: f64,
    /// Dollars per 1,000 requests at the observed rate.
    pub cost_per_1k: f64,
}

/// Rolling wall-clock window over completed request volume.
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    cfg: WindowConfig,
    request_count: u64,
    window_start: Instant,
    gauges: Gauges,
}

impl MetricsWindow {
    /// Create a window starting now.
    pub fn new(cfg: WindowConfig) -> Self {
        Self::starting_at(cfg, Instant::now())
    }

    /// Create a window with an explicit start, for simulated clocks.
    pub fn starting_at(cfg: WindowConfig, start: Instant) -> Self {
        Self {
            cfg,
            request_count: 0,
            window_start: start,
            gauges: Gauges::default(),
        }
    }

    /// The currently published gauges.
    pub fn gauges(&self) -> Gauges {
        self.gauges
    }

    /// Requests accumulated in the open window.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Record `batch` completed requests at the current wall-clock time.
    pub fn observe(&mut self, batch: u32) {
        self.observe_at(batch, Instant::now());
    }

    /// Record `batch` completed requests at an explicit time.
    ///
    /// If the window has been open for at least `window_secs`, the gauges are
    /// recomputed from the accumulated volume and the window resets; otherwise
    /// this only accumulates.
    pub fn observe_at(&mut self, batch: u32, now: Instant) {
        self.request_count += u64::from(batch);
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        if elapsed < self.cfg.window_secs {
            return;
        }
        let rps = self.request_count as f64 / elapsed;
        let utilization = (rps / self.cfg.capacity_rps * 100.0).min(100.0);
        let k_per_hour = (rps * 3600.0 / 1000.0).max(RATE_EPS);
        self.gauges = Gauges {
            utilization_percent: utilization,
            cost_per_1k: self.cfg.hourly_cost / k_per_hour,
        };
        log::debug!(
            "window closed: elapsed={elapsed:.1}s rps={rps:.2} util={:.1}% cost/1k={:.6}",
            self.gauges.utilization_percent,
            self.gauges.cost_per_1k
        );
        self.request_count = 0;
        self.window_start = now;
    }
}
