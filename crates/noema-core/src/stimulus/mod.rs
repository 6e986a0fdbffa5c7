//! Stimulus injector - targeted energy injection with optional priming
//!
//! External collaborators resolve free text to logical ids before calling;
//! the injector only sees (logical, weight) pairs summing to 1 plus a
//! budget. Invalid batches reject wholesale; no partial injection. Writes
//! that would overshoot the energy bound saturate through `tanh(2 * raw)`
//! instead of adding linearly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{FeatureFlags, InjectionConfig};
use crate::error::{EngineError, Result};
use crate::graph::{saturate, LogicalId};
use crate::store::GraphStore;

/// Tolerance on the target-weight sum.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// EMA coefficient folding each stimulus affect into the recent-affect state.
const AFFECT_EMA: f64 = 0.3;

/// Meta keys carrying a node's emotional vector for priming.
const VALENCE_META_KEY: &str = "valence";
const AROUSAL_META_KEY: &str = "arousal";

// ============================================================================
// REQUEST / REPORT TYPES
// ============================================================================

/// One injection target with its share of the budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StimulusTarget {
    /// Target logical id
    pub logical: LogicalId,
    /// Share of the budget, weights sum to 1 across the batch
    pub weight: f64,
}

/// A two-axis affect vector attached to a stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AffectVector {
    /// Pleasantness, in [-1, 1]
    pub valence: f64,
    /// Intensity, in [-1, 1]
    pub arousal: f64,
}

impl AffectVector {
    fn magnitude(&self) -> f64 {
        (self.valence * self.valence + self.arousal * self.arousal).sqrt()
    }

    fn cosine(&self, other: &AffectVector) -> f64 {
        let denom = self.magnitude() * other.magnitude();
        if denom <= 0.0 {
            return 0.0;
        }
        (self.valence * other.valence + self.arousal * other.arousal) / denom
    }
}

/// A validated injection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InjectRequest {
    /// Targets with weights summing to 1
    pub targets: Vec<StimulusTarget>,
    /// Total energy to distribute
    pub budget: f64,
    /// Drop the request instead of applying it after this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Optional affect for priming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affect: Option<AffectVector>,
}

/// Per-target outcome of an injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedInjection {
    /// Target logical id
    pub logical: LogicalId,
    /// Budget share requested for this target
    pub requested: f64,
    /// Energy actually added after saturation
    pub applied: f64,
}

/// Outcome of one injection batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectReport {
    /// Energy actually added across all targets
    pub injected_total: f64,
    /// Requested energy lost to saturation
    pub clipped: f64,
    /// Per-target breakdown
    pub applied: Vec<AppliedInjection>,
}

// ============================================================================
// INJECTOR
// ============================================================================

/// Stateful injector; the only state is the recent-affect EMA used by
/// priming.
#[derive(Debug, Default, Clone)]
pub struct StimulusInjector {
    recent_affect: Option<AffectVector>,
}

impl StimulusInjector {
    /// Create an injector with no affect history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent-affect EMA, if any stimulus carried affect yet.
    pub fn recent_affect(&self) -> Option<AffectVector> {
        self.recent_affect
    }

    /// Validate and apply one injection batch.
    ///
    /// The whole batch is checked before any energy moves: a bad budget, a
    /// bad weight sum, or one unresolvable target rejects everything.
    pub fn inject(
        &mut self,
        store: &mut GraphStore,
        config: &InjectionConfig,
        features: &FeatureFlags,
        request: &InjectRequest,
    ) -> Result<InjectReport> {
        if request.budget < 0.0 || request.budget > config.max_budget {
            return Err(EngineError::BudgetOutOfRange(request.budget));
        }
        if request.targets.is_empty() {
            return Err(EngineError::InvariantViolation(
                "injection requires at least one target".to_string(),
            ));
        }
        let weight_sum: f64 = request.targets.iter().map(|t| t.weight).sum();
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvariantViolation(format!(
                "target weights sum to {weight_sum}, expected 1"
            )));
        }
        for target in &request.targets {
            if target.weight < 0.0 {
                return Err(EngineError::InvariantViolation(format!(
                    "negative weight for target {}",
                    target.logical
                )));
            }
            if store.live_node(&target.logical).is_none() {
                // A known-but-superseded-away id is distinct from one the
                // collaborator never resolved at all.
                return if store.node_history(&target.logical).is_empty() {
                    Err(EngineError::UnknownTarget(target.logical.clone()))
                } else {
                    Err(EngineError::NotFound(target.logical.clone()))
                };
            }
        }

        let weights = self.primed_weights(store, config, features, request);

        let mut report = InjectReport {
            injected_total: 0.0,
            clipped: 0.0,
            applied: Vec::with_capacity(request.targets.len()),
        };

        for (target, weight) in request.targets.iter().zip(weights) {
            let requested = weight * request.budget;
            let pre = store.energy(&target.logical);
            let raw = pre + requested;
            // Linear within bounds; saturating only when the write would
            // overshoot. A node already at 1 stays at 1.
            let post = if raw <= 1.0 { raw } else { saturate(raw).max(pre) };
            store.set_energy(&target.logical, post);

            let applied = post - pre;
            report.injected_total += applied;
            report.clipped += requested - applied;
            report.applied.push(AppliedInjection {
                logical: target.logical.clone(),
                requested,
                applied,
            });
        }

        if let Some(affect) = request.affect {
            self.fold_affect(affect);
        }

        tracing::debug!(
            targets = request.targets.len(),
            budget = request.budget,
            injected = report.injected_total,
            "stimulus injected"
        );
        Ok(report)
    }

    /// Target weights after optional affective priming. The budget total is
    /// preserved: priming only shifts the distribution.
    fn primed_weights(
        &self,
        store: &GraphStore,
        config: &InjectionConfig,
        features: &FeatureFlags,
        request: &InjectRequest,
    ) -> Vec<f64> {
        let base: Vec<f64> = request.targets.iter().map(|t| t.weight).collect();
        if !features.affective_priming {
            return base;
        }
        let Some(recent) = self.recent_affect else {
            return base;
        };
        if recent.magnitude() < config.priming_floor {
            return base;
        }

        let gain = config.priming_gain.min(0.2);
        let scored: Vec<f64> = request
            .targets
            .iter()
            .zip(&base)
            .map(|(target, weight)| {
                let emo = node_affect(store, &target.logical);
                let modulator = match emo {
                    Some(emo) => 1.0 + gain * recent.cosine(&emo),
                    None => 1.0,
                };
                weight * modulator
            })
            .collect();

        let total: f64 = scored.iter().sum();
        if total <= 0.0 {
            return base;
        }
        scored.into_iter().map(|s| s / total).collect()
    }

    fn fold_affect(&mut self, affect: AffectVector) {
        self.recent_affect = Some(match self.recent_affect {
            None => affect,
            Some(prev) => AffectVector {
                valence: prev.valence + AFFECT_EMA * (affect.valence - prev.valence),
                arousal: prev.arousal + AFFECT_EMA * (affect.arousal - prev.arousal),
            },
        });
    }
}

/// A node's emotional vector from live-version meta, if present.
fn node_affect(store: &GraphStore, logical: &LogicalId) -> Option<AffectVector> {
    let version = store.live_node(logical)?;
    let valence = version.meta.get(VALENCE_META_KEY)?.as_f64()?;
    let arousal = version
        .meta
        .get(AROUSAL_META_KEY)
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    Some(AffectVector { valence, arousal })
}

// ============================================================================
// TESTS
// ============================================================================
