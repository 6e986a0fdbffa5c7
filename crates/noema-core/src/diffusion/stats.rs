//! Rolling per-type weight statistics for standardized weight reads.
//!
//! A raw `weight_log` means nothing across link types with different learning
//! histories, so traversal scores use the standardized read
//! `W~ = exp((w - mean_T) / (std_T + eps))` against the stats of the link's
//! type. Stats are sealed once per tick; consumers always read the last
//! sealed snapshot, never a half-updated one.

use std::collections::HashMap;

use crate::graph::LinkType;
use crate::store::GraphStore;

/// Guard against zero variance in freshly seeded graphs.
pub const STANDARDIZE_EPSILON: f64 = 1e-6;

// ============================================================================
// WEIGHT STATS
// ============================================================================

/// Sealed mean/std of `weight_log` for one link type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightStats {
    /// Mean of weight_log over live links of the type
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    /// How many links contributed
    pub count: usize,
}

impl Default for WeightStats {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            count: 0,
        }
    }
}

/// Per-type statistics registry, sealed at end of tick.
#[derive(Debug, Default, Clone)]
pub struct TypeWeightStats {
    sealed: HashMap<LinkType, WeightStats>,
}

impl TypeWeightStats {
    /// Create an empty registry; standardized reads fall back to the
    /// zero-mean/zero-std baseline until the first seal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute stats over all live links and seal the snapshot.
    pub fn seal(&mut self, store: &GraphStore) {
        let mut sums: HashMap<LinkType, (f64, f64, usize)> = HashMap::new();
        for (_, link_type, weight_log) in store.iter_link_weights() {
            let entry = sums.entry(link_type).or_insert((0.0, 0.0, 0));
            entry.0 += weight_log;
            entry.1 += weight_log * weight_log;
            entry.2 += 1;
        }

        self.sealed = sums
            .into_iter()
            .map(|(link_type, (sum, sum_sq, count))| {
                let n = count as f64;
                let mean = sum / n;
                let variance = (sum_sq / n - mean * mean).max(0.0);
                (
                    link_type,
                    WeightStats {
                        mean,
                        std: variance.sqrt(),
                        count,
                    },
                )
            })
            .collect();
    }

    /// Sealed stats for a type, defaulting to the zero baseline.
    pub fn stats(&self, link_type: LinkType) -> WeightStats {
        self.sealed.get(&link_type).copied().unwrap_or_default()
    }

    /// Standardized weight read for scoring and transfer.
    ///
    /// A link at its type's mean reads as 1.0; one standard deviation above
    /// reads as e.
    pub fn standardize(&self, link_type: LinkType, weight_log: f64) -> f64 {
        let stats = self.stats(link_type);
        ((weight_log - stats.mean) / (stats.std + STANDARDIZE_EPSILON)).exp()
    }
}

// ============================================================================
// TESTS
// ============================================================================
