//! Stride execution - staged deltas and atomic commit.
//!
//! A stride is one selected edge transfer within a tick. All strides of a
//! frame stage into a delta buffer; nothing touches node energies until the
//! commit applies every delta at once, clamped to [0, 1]. The buffer is the
//! only place transfer arithmetic happens, which keeps the conservation
//! check a straight sum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{DiffusionConfig, FeatureFlags};
use crate::graph::LogicalId;
use crate::store::GraphStore;

use super::fanout::{Candidate, FanoutSelector, SelectionReason};
use super::stats::TypeWeightStats;

/// Meta key consulted for target-side stickiness when the feature is on.
const STICKINESS_META_KEY: &str = "stickiness";

// ============================================================================
// STRIDE RECORD
// ============================================================================

/// Log entry for one executed stride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrideRecord {
    /// Source logical id
    pub src: LogicalId,
    /// Destination logical id
    pub dst: LogicalId,
    /// Gross energy moved off the source
    pub delta_e: f64,
    /// Source energy before the stride
    pub e_src_pre: f64,
    /// Destination energy before the stride
    pub e_dst_pre: f64,
    /// Traversal score of the chosen edge
    pub score: f64,
    /// Which fanout branch chose the edge
    pub reason: SelectionReason,
}

// ============================================================================
// DELTA BUFFER
// ============================================================================

/// Per-tick staged energy deltas, cleared at frame start.
///
/// Ordered keys keep the commit sweep deterministic.
#[derive(Debug, Default, Clone)]
pub struct DeltaBuffer {
    deltas: BTreeMap<LogicalId, f64>,
}

impl DeltaBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all staged deltas.
    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    /// Stage an energy change for a node.
    pub fn stage(&mut self, logical: &LogicalId, delta: f64) {
        *self.deltas.entry(logical.clone()).or_insert(0.0) += delta;
    }

    /// Staged delta for a node (0 when untouched).
    pub fn get(&self, logical: &LogicalId) -> f64 {
        self.deltas.get(logical).copied().unwrap_or(0.0)
    }

    /// Sum of all staged deltas. Exactly the negated flow-through loss when
    /// every transfer is conservative.
    pub fn sum(&self) -> f64 {
        self.deltas.values().sum()
    }

    /// Number of touched nodes.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Iterate staged deltas in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &f64)> {
        self.deltas.iter()
    }
}

// ============================================================================
// DIFFUSION PASS
// ============================================================================

/// Accounting for one frame's stride stage.
#[derive(Debug, Default, Clone)]
pub struct DiffusionPass {
    /// Stride log in execution order
    pub records: Vec<StrideRecord>,
    /// Gross energy moved off sources
    pub energy_transferred: f64,
    /// Energy lost to target-side stickiness
    pub flow_through_loss: f64,
}

/// Execute all strides for the frame into the delta buffer.
///
/// Sources are visited in id order; candidates come from the fanout
/// selector. Per-source transfers are capped at `beta_cap` of the source's
/// pre-stride energy, scaling every chosen edge proportionally when the raw
/// sum exceeds the cap. A source with zero energy emits nothing.
#[allow(clippy::too_many_arguments)]
pub fn execute_strides(
    store: &GraphStore,
    sources: &[LogicalId],
    selector: &FanoutSelector,
    stats: &TypeWeightStats,
    config: &DiffusionConfig,
    features: &FeatureFlags,
    dt_secs: f64,
    delta: &mut DeltaBuffer,
) -> DiffusionPass {
    let mut pass = DiffusionPass::default();

    for src in sources {
        let e_pre = store.energy(src);
        if e_pre <= 0.0 {
            continue;
        }

        let candidates = selector.select(store, stats, src, None);
        if candidates.is_empty() {
            continue;
        }

        // Exhaustive fanout transfers per edge; top-K selection splits the
        // budget across its picks by softmax over scores.
        let shares = if candidates[0].reason == SelectionReason::Exhaustive {
            vec![1.0; candidates.len()]
        } else {
            softmax_shares(&candidates, config.softmax_temperature)
        };

        // Raw per-edge transfers before the cap.
        let mut raw: Vec<f64> = candidates
            .iter()
            .zip(&shares)
            .map(|(c, share)| e_pre * c.weight_std * config.alpha_tick * dt_secs * share)
            .collect();

        let total: f64 = raw.iter().sum();
        let cap = config.beta_cap * e_pre;
        if total > cap && total > 0.0 {
            let scale = cap / total;
            for r in raw.iter_mut() {
                *r *= scale;
            }
        }

        for (candidate, delta_e) in candidates.iter().zip(raw) {
            if delta_e <= 0.0 {
                continue;
            }
            let dst = &candidate.link.dst;
            let e_dst_pre = store.energy(dst);

            let retained = if features.stickiness {
                delta_e * stickiness_of(store, dst)
            } else {
                delta_e
            };
            let loss = delta_e - retained;

            delta.stage(dst, retained);
            delta.stage(src, -delta_e);

            pass.energy_transferred += delta_e;
            pass.flow_through_loss += loss;
            pass.records.push(StrideRecord {
                src: src.clone(),
                dst: dst.clone(),
                delta_e,
                e_src_pre: e_pre,
                e_dst_pre,
                score: candidate.score,
                reason: candidate.reason,
            });
        }
    }

    pass
}

/// Softmax shares over candidate scores. A single candidate takes share 1;
/// ties split evenly. Arg-sort order is already deterministic upstream.
fn softmax_shares(candidates: &[Candidate], temperature: f64) -> Vec<f64> {
    if candidates.len() <= 1 {
        return vec![1.0; candidates.len()];
    }
    let max_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = candidates
        .iter()
        .map(|c| ((c.score - max_score) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Target-side retention factor from node meta, clamped to [0.1, 1.0].
fn stickiness_of(store: &GraphStore, logical: &LogicalId) -> f64 {
    store
        .live_node(logical)
        .and_then(|v| v.meta.get(STICKINESS_META_KEY))
        .and_then(|value| value.as_f64())
        .map(|s| s.clamp(0.1, 1.0))
        .unwrap_or(1.0)
}

// ============================================================================
// COMMIT
// ============================================================================

/// Accounting for an atomic commit.
#[derive(Debug, Default, Clone)]
pub struct CommitOutcome {
    /// Sum of energy changes actually applied
    pub applied_delta_sum: f64,
    /// Energy destroyed by clamping at the [0, 1] bounds
    pub clip_loss: f64,
}

/// Apply every staged delta at once, clamping each node to [0, 1].
pub fn commit(store: &mut GraphStore, delta: &DeltaBuffer) -> CommitOutcome {
    let mut outcome = CommitOutcome::default();
    for (logical, staged) in delta.iter() {
        let pre = store.energy(logical);
        let post = (pre + staged).clamp(0.0, 1.0);
        outcome.applied_delta_sum += post - pre;
        outcome.clip_loss += (pre + staged) - post;
        store.set_energy(logical, post);
    }
    outcome
}

// ============================================================================
// TESTS
// ============================================================================
