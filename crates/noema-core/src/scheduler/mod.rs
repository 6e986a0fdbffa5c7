//! Tick scheduler - dt derivation, bounds, smoothing
//!
//! The tick interval tracks stimulus recency: a busy graph ticks fast, an
//! idle one slows down toward the upper bound. All physics multiply by the
//! derived dt, so the derivation is clamped hard on both ends. Optional EMA
//! smoothing (time-aware, for irregular arrivals) damps interval jumps.

use std::time::Instant;

use crate::config::SchedulerConfig;

// ============================================================================
// TICK SCHEDULER
// ============================================================================

/// Derives the per-tick interval from stimulus recency.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    config: SchedulerConfig,
    last_stimulus: Option<Instant>,
    smoothed: Option<f64>,
}

impl TickScheduler {
    /// Create a scheduler with the given bounds and smoothing horizon.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            last_stimulus: None,
            smoothed: None,
        }
    }

    /// Swap in a new configuration; smoothing state carries over.
    pub fn reconfigure(&mut self, config: SchedulerConfig) {
        self.config = config;
    }

    /// Record a stimulus arrival; the next interval restarts from here.
    pub fn note_stimulus(&mut self) {
        self.last_stimulus = Some(Instant::now());
    }

    /// Current interval in seconds, derived from time since last stimulus.
    pub fn current_dt(&mut self) -> f64 {
        let raw = self
            .last_stimulus
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(self.config.max_dt_secs);
        self.derive_dt(raw)
    }

    /// Clamp and optionally smooth a raw interval. Exposed separately so
    /// tests and embedders can drive time explicitly.
    pub fn derive_dt(&mut self, raw_secs: f64) -> f64 {
        let clamped = raw_secs.clamp(self.config.min_dt_secs, self.config.max_dt_secs);

        let Some(horizon) = self.config.ema_horizon_secs else {
            return clamped;
        };

        let smoothed = match self.smoothed {
            None => clamped,
            Some(prev) => {
                // Time-aware EMA: longer gaps weigh the new observation more.
                let alpha = 1.0 - (-clamped / horizon.max(f64::EPSILON)).exp();
                prev + alpha * (clamped - prev)
            }
        };
        let bounded = smoothed.clamp(self.config.min_dt_secs, self.config.max_dt_secs);
        self.smoothed = Some(bounded);
        bounded
    }
}

// ============================================================================
// TESTS
// ============================================================================
