//! Criticality controller - spectral-radius estimation and control
//!
//! The effective per-tick operator is `T = (1 - delta) * [(1 - alpha) I +
//! alpha P^T]`, with `P` the row-stochastic transition induced by the current
//! standardized weights and the stride policy. A cheap branching-ratio proxy
//! runs every tick; an authoritative power-iteration sample runs on a coarser
//! cadence over the active sub-operator. A P-controller steers the decay
//! lever (and optionally the diffusion share) toward the target radius.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CriticalityConfig;
use crate::diffusion::{FanoutSelector, TypeWeightStats};
use crate::frontier::Frontier;
use crate::graph::LogicalId;
use crate::store::GraphStore;

/// Denominator guard for the branching proxy.
const PROXY_EPSILON: f64 = 1e-9;

/// Cap on the proxy. Growth beyond this carries no extra control signal and
/// would slam the lever into its clamp in a single step.
const PROXY_CAP: f64 = 1.5;

// ============================================================================
// SAFETY STATE
// ============================================================================

/// Coarse propagation-stability classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SafetyState {
    /// rho below 0.9: cascades die out
    Subcritical,
    /// rho in the 0.9 - 1.1 band: sustained propagation
    #[default]
    Critical,
    /// rho above 1.1: runaway growth
    Supercritical,
}

impl SafetyState {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyState::Subcritical => "subcritical",
            SafetyState::Critical => "critical",
            SafetyState::Supercritical => "supercritical",
        }
    }
}

impl std::fmt::Display for SafetyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TICK OBSERVATIONS
// ============================================================================

/// Per-tick flow totals the proxy is computed from.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowObservation {
    /// Energy that left sources via strides this tick
    pub transferred_out: f64,
    /// Energy injected since the previous tick
    pub injected: f64,
}

impl FlowObservation {
    /// Energy in motion this tick: what the frontier pushed plus what
    /// entered from outside.
    pub fn activity(&self) -> f64 {
        self.transferred_out + self.injected
    }
}

/// Controller output for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalityUpdate {
    /// Branching-ratio proxy for this tick
    pub rho_proxy: f64,
    /// Power-iteration sample, present on cadence ticks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rho_sampled: Option<f64>,
    /// Safety classification after hysteresis
    pub state: SafetyState,
    /// Controller decay lever after this tick's adjustment
    pub delta_lever: f64,
    /// Multiplier currently applied to the diffusion share
    pub alpha_scale: f64,
    /// Active-set coherence, present when the metric is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coherence: Option<f64>,
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Stateful rho controller owned by the tick loop.
#[derive(Debug, Clone)]
pub struct CriticalityController {
    delta_lever: f64,
    alpha_scale: f64,
    state: SafetyState,
    prev_activity: Option<f64>,
}

impl Default for CriticalityController {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalityController {
    /// Create a controller with the lever at rest.
    pub fn new() -> Self {
        Self {
            delta_lever: 0.0,
            alpha_scale: 1.0,
            state: SafetyState::Critical,
            prev_activity: None,
        }
    }

    /// Current decay lever, consumed by the decay engine.
    pub fn delta_lever(&self) -> f64 {
        self.delta_lever
    }

    /// Current diffusion-share multiplier.
    pub fn alpha_scale(&self) -> f64 {
        self.alpha_scale
    }

    /// Current safety classification.
    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Branching-ratio proxy: this tick's energy in motion over the previous
    /// tick's. Growth above 1 means the cascade is compounding. Quiet or
    /// cold ticks read 0, matching the empty-frontier rule for the sampled
    /// estimate; activity appearing out of silence caps at `PROXY_CAP`.
    pub fn branching_ratio(&mut self, flow: &FlowObservation) -> f64 {
        let activity = flow.activity();
        let proxy = match self.prev_activity {
            _ if activity <= 0.0 => 0.0,
            None => 0.0,
            Some(prev) if prev <= PROXY_EPSILON => PROXY_CAP,
            Some(prev) => (activity / prev).min(PROXY_CAP),
        };
        self.prev_activity = Some(activity);
        proxy
    }

    /// Run one controller step.
    ///
    /// `rho_sampled` is the power-iteration estimate when this tick is on the
    /// sampling cadence; otherwise the proxy steers. `effective_target`
    /// already includes any task-adaptive nudge.
    pub fn control(
        &mut self,
        config: &CriticalityConfig,
        effective_target: f64,
        rho_proxy: f64,
        rho_sampled: Option<f64>,
        alpha_adjust_enabled: bool,
    ) -> SafetyState {
        let rho_hat = rho_sampled.unwrap_or(rho_proxy);
        let error = rho_hat - effective_target;

        self.delta_lever =
            (self.delta_lever + config.k_p * error).clamp(config.delta_min, config.delta_max);

        if alpha_adjust_enabled {
            if let Some(k_alpha) = config.k_alpha {
                self.alpha_scale = (self.alpha_scale - k_alpha * error).clamp(0.25, 1.0);
            }
        }

        self.state = classify(self.state, rho_hat, config.hysteresis);
        self.state
    }
}

/// Hysteresis classification: leaving a state requires clearing the band
/// edge by the margin, so a rho bouncing on 1.1 does not flap.
fn classify(current: SafetyState, rho: f64, hysteresis: f64) -> SafetyState {
    match current {
        SafetyState::Critical => {
            if rho > 1.1 + hysteresis {
                SafetyState::Supercritical
            } else if rho < 0.9 - hysteresis {
                SafetyState::Subcritical
            } else {
                SafetyState::Critical
            }
        }
        SafetyState::Supercritical => {
            if rho < 0.9 - hysteresis {
                SafetyState::Subcritical
            } else if rho < 1.1 - hysteresis {
                SafetyState::Critical
            } else {
                SafetyState::Supercritical
            }
        }
        SafetyState::Subcritical => {
            if rho > 1.1 + hysteresis {
                SafetyState::Supercritical
            } else if rho > 0.9 + hysteresis {
                SafetyState::Critical
            } else {
                SafetyState::Subcritical
            }
        }
    }
}

// ============================================================================
// POWER ITERATION
// ============================================================================

/// Estimate the spectral radius of the active sub-operator.
///
/// Builds `P` over active and shadow nodes from the same fanout policy the
/// diffusion engine uses, applies `K` power-iteration steps to a uniform
/// start vector, and reports the Rayleigh quotient. An empty active set
/// returns 0 and the caller falls back to the proxy.
pub fn sample_rho(
    store: &GraphStore,
    frontier: &Frontier,
    selector: &FanoutSelector,
    stats: &TypeWeightStats,
    alpha_effective: f64,
    delta_effective: f64,
    iterations: usize,
) -> f64 {
    let nodes: Vec<LogicalId> = frontier
        .active()
        .chain(frontier.shadow())
        .cloned()
        .collect();
    if frontier.active_len() == 0 || nodes.is_empty() {
        return 0.0;
    }

    let index: HashMap<&LogicalId, usize> = nodes.iter().zip(0..).collect();
    let n = nodes.len();

    // Row-stochastic transition rows for active sources; everything else
    // self-loops so the operator stays stochastic.
    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (i, logical) in nodes.iter().enumerate() {
        if !frontier.is_active(logical) {
            rows[i].push((i, 1.0));
            continue;
        }
        let candidates = selector.select(store, stats, logical, None);
        let in_scope: Vec<(usize, f64)> = candidates
            .iter()
            .filter_map(|c| index.get(&c.link.dst).map(|&j| (j, c.weight_std)))
            .collect();
        let total: f64 = in_scope.iter().map(|(_, w)| w).sum();
        if in_scope.is_empty() || total <= 0.0 {
            rows[i].push((i, 1.0));
        } else {
            rows[i] = in_scope
                .into_iter()
                .map(|(j, w)| (j, w / total))
                .collect();
        }
    }

    let alpha = alpha_effective.clamp(0.0, 1.0);
    let lever = (1.0 - delta_effective).clamp(0.0, 1.0);
    let apply = |v: &[f64]| -> Vec<f64> {
        // T v = (1 - delta) [(1 - alpha) v + alpha P^T v]
        let mut pt_v = vec![0.0; n];
        for (i, row) in rows.iter().enumerate() {
            for (j, p) in row {
                pt_v[*j] += p * v[i];
            }
        }
        (0..n)
            .map(|i| lever * ((1.0 - alpha) * v[i] + alpha * pt_v[i]))
            .collect()
    };

    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    for _ in 0..iterations.max(1) {
        let next = apply(&v);
        let norm: f64 = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm <= 0.0 {
            return 0.0;
        }
        v = next.into_iter().map(|x| x / norm).collect();
    }

    let tv = apply(&v);
    let num: f64 = v.iter().zip(&tv).map(|(a, b)| a * b).sum();
    let den: f64 = v.iter().map(|x| x * x).sum();
    if den <= 0.0 { 0.0 } else { num / den }
}

// ============================================================================
// COHERENCE
// ============================================================================

/// Mean pairwise co-activation of the active set: the fraction of ordered
/// active pairs joined by a live link. Read-time aggregation only.
pub fn coherence(store: &GraphStore, frontier: &Frontier) -> f64 {
    let active: Vec<&LogicalId> = frontier.active().collect();
    let n = active.len();
    if n < 2 {
        return 0.0;
    }
    let mut connected = 0usize;
    for src in &active {
        for link in store.adjacency_out(src) {
            if frontier.is_active(&link.dst) {
                connected += 1;
            }
        }
    }
    connected as f64 / (n * (n - 1)) as f64
}

// ============================================================================
// TESTS
// ============================================================================
