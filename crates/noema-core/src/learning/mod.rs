//! Link strengthening - Hebbian updates behind the newness gate
//!
//! Strengthening fires only for strides that recruit a previously dormant
//! target: both endpoints below threshold at the previous frame boundary and
//! the target flipping active after this commit. Utility is how much of the
//! target's threshold gap the stride closed, z-scored against a per-type
//! rolling distribution so different link types learn on comparable scales.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;
use crate::diffusion::StrideRecord;
use crate::graph::{LinkKey, LinkType, LogicalId, VersionId};
use crate::store::GraphStore;

/// Gap denominator guard.
const GAP_EPSILON: f64 = 1e-6;

// ============================================================================
// WEIGHT UPDATE
// ============================================================================

/// One applied strengthening, as reported on the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightUpdate {
    /// The strengthened link's endpoints
    pub link: LinkKey,
    /// Live version id of the link
    pub link_id: VersionId,
    /// Applied change to weight_log
    pub delta_log_w: f64,
}

// ============================================================================
// ROLLING Z-SCORE
// ============================================================================

/// Welford-style running stats seeded with a unit-variance prior at zero, so
/// the very first utility observation of a type already produces a usable
/// z-score instead of a degenerate zero.
#[derive(Debug, Clone)]
struct RollingZ {
    count: f64,
    mean: f64,
    m2: f64,
}

impl Default for RollingZ {
    fn default() -> Self {
        Self {
            count: 1.0,
            mean: 0.0,
            m2: 1.0,
        }
    }
}

impl RollingZ {
    /// Z-score `x` against the current stats, then fold it in.
    fn observe(&mut self, x: f64) -> f64 {
        let std = (self.m2 / self.count).sqrt();
        let z = (x - self.mean) / (std + GAP_EPSILON);

        self.count += 1.0;
        let delta = x - self.mean;
        self.mean += delta / self.count;
        self.m2 += delta * (x - self.mean);
        z
    }
}

// ============================================================================
// STRENGTHENER
// ============================================================================

/// Stateful strengthener owned by the tick loop.
#[derive(Debug, Default)]
pub struct LinkStrengthener {
    phi_stats: HashMap<LinkType, RollingZ>,
}

impl LinkStrengthener {
    /// Create a strengthener with fresh per-type priors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply strengthening for one committed frame.
    ///
    /// `prev_active` is the active set at the previous frame boundary;
    /// `flipped_up` the nodes that crossed up in this commit. Strides whose
    /// endpoints were both already active never strengthen.
    pub fn strengthen(
        &mut self,
        store: &mut GraphStore,
        config: &LearningConfig,
        strides: &[StrideRecord],
        prev_active: &HashSet<LogicalId>,
        flipped_up: &HashSet<LogicalId>,
    ) -> Vec<WeightUpdate> {
        let mut updates = Vec::new();

        for stride in strides {
            // Newness gate: a recruitment, not a reinforcement of an
            // already-running pattern.
            if prev_active.contains(&stride.src) || prev_active.contains(&stride.dst) {
                continue;
            }
            if !flipped_up.contains(&stride.dst) {
                continue;
            }

            let key = LinkKey {
                src: stride.src.clone(),
                dst: stride.dst.clone(),
            };
            let Some(link_id) = store.live_link(&key).map(|v| v.version_id.clone()) else {
                continue;
            };
            let Some(link_type) = store.live_link(&key).map(|v| v.link_type) else {
                continue;
            };

            let threshold = store
                .runtime(&stride.dst)
                .map(|rt| rt.threshold)
                .unwrap_or(1.0);
            let gap = (threshold - stride.e_dst_pre).max(0.0);
            if gap <= 0.0 {
                continue;
            }

            let phi = stride.delta_e.min(gap) / (gap + GAP_EPSILON);
            let z = self.phi_stats.entry(link_type).or_default().observe(phi);

            let old = store.link_weight_log(&key);
            let raw = old + config.eta * z;
            // Soft ceiling: weight_log saturates toward +-weight_ceiling.
            let new = config.weight_ceiling * (raw / config.weight_ceiling).tanh();
            let delta_log_w = new - old;
            if delta_log_w == 0.0 {
                continue;
            }

            store.set_link_weight_log(&key, new);
            updates.push(WeightUpdate {
                link: key,
                link_id,
                delta_log_w,
            });
        }

        updates
    }
}

// ============================================================================
// TESTS
// ============================================================================
