//! Fanout selector - local candidate edge selection per source.
//!
//! Selection is strictly local: the selector sees one source's out-links and
//! nothing else. Strategy depends on local fanout, and ties break
//! lexicographically on (-score, dst) so two runs pick identical candidates.

use serde::{Deserialize, Serialize};

use crate::graph::{LogicalId, ResolvedLink};
use crate::store::GraphStore;

use super::stats::TypeWeightStats;

/// Out-degree above which selection goes selective (top-K).
const SELECTIVE_DEGREE: usize = 10;

/// Out-degree below which every edge is taken.
const EXHAUSTIVE_DEGREE: usize = 5;

// ============================================================================
// CANDIDATES
// ============================================================================

/// Which branch of the fanout policy chose an edge. Recorded on stride logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionReason {
    /// Low fanout: every out-edge taken
    Exhaustive,
    /// High fanout: top-K by score
    Selective,
    /// Mid fanout: top-K with degree-derived K
    Balanced,
}

impl SelectionReason {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionReason::Exhaustive => "exhaustive",
            SelectionReason::Selective => "selective",
            SelectionReason::Balanced => "balanced",
        }
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A selected outgoing edge with its traversal score.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The resolved link
    pub link: ResolvedLink,
    /// Standardized weight read of the link
    pub weight_std: f64,
    /// Traversal score (standardized weight, optionally modulated)
    pub score: f64,
    /// Which policy branch chose this edge
    pub reason: SelectionReason,
}

// ============================================================================
// FANOUT SELECTOR
// ============================================================================

/// Per-source candidate selection with bounded K.
#[derive(Debug, Clone)]
pub struct FanoutSelector {
    /// K used on the selective branch, from configuration (1..=4)
    top_k: usize,
}

impl FanoutSelector {
    /// Build a selector with the configured selective K.
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.clamp(1, 4),
        }
    }

    /// Select candidates for one source.
    ///
    /// Scores are the standardized weight reads; `modulate` lets callers
    /// apply read-time adjustments (stickiness, priming) without the
    /// selector knowing about them. Zero out-degree yields an empty set.
    pub fn select(
        &self,
        store: &GraphStore,
        stats: &TypeWeightStats,
        source: &LogicalId,
        modulate: Option<&dyn Fn(&ResolvedLink, f64) -> f64>,
    ) -> Vec<Candidate> {
        let links = store.adjacency_out(source);
        let degree = links.len();
        if degree == 0 {
            return Vec::new();
        }

        let (reason, k) = if degree > SELECTIVE_DEGREE {
            (SelectionReason::Selective, self.top_k)
        } else if degree < EXHAUSTIVE_DEGREE {
            (SelectionReason::Exhaustive, degree)
        } else {
            (SelectionReason::Balanced, (degree / 2).clamp(1, 4))
        };

        let mut candidates: Vec<Candidate> = links
            .into_iter()
            .map(|link| {
                let weight_std = stats.standardize(link.link_type, link.weight_log);
                let score = match modulate {
                    Some(f) => f(&link, weight_std),
                    None => weight_std,
                };
                Candidate {
                    link,
                    weight_std,
                    score,
                    reason,
                }
            })
            .collect();

        // Deterministic order: score descending, then destination id.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.link.dst.cmp(&b.link.dst))
        });
        candidates.truncate(k);
        candidates
    }
}

// ============================================================================
// TESTS
// ============================================================================
