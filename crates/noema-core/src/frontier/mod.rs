//! Frontier sets - active/shadow membership under threshold flips
//!
//! Two disjoint sets maintained at frame boundaries:
//! - Active: nodes whose energy meets their threshold,
//! - Shadow: one-hop out-neighbors of Active, minus Active itself.
//!
//! Within a tick, membership updates are deferred: staged deltas never touch
//! the sets directly. The commit step recomputes membership and reports each
//! threshold crossing exactly once per node per tick.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::graph::LogicalId;
use crate::store::GraphStore;

// ============================================================================
// FLIPS
// ============================================================================

/// Direction of a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    /// Crossed up into the active set
    Up,
    /// Dropped below threshold
    Down,
}

impl FlipDirection {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FlipDirection::Up => "up",
            FlipDirection::Down => "down",
        }
    }
}

impl std::fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One threshold crossing, recorded once per tick per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flip {
    /// Node that crossed its threshold
    pub logical_id: LogicalId,
    /// Crossing direction
    pub direction: FlipDirection,
}

// ============================================================================
// FRONTIER
// ============================================================================

/// Active/shadow membership, valid at frame boundaries.
///
/// Ordered sets keep traversal deterministic: two runs over the same graph
/// and stimulus sequence visit sources in the same order.
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    active: BTreeSet<LogicalId>,
    shadow: BTreeSet<LogicalId>,
}

impl Frontier {
    /// Create an empty frontier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently in the active set, in id order.
    pub fn active(&self) -> impl Iterator<Item = &LogicalId> {
        self.active.iter()
    }

    /// Nodes currently in the shadow set, in id order.
    pub fn shadow(&self) -> impl Iterator<Item = &LogicalId> {
        self.shadow.iter()
    }

    /// Whether a node is in the active set.
    pub fn is_active(&self, logical: &LogicalId) -> bool {
        self.active.contains(logical)
    }

    /// Whether a node is in the shadow set.
    pub fn is_shadow(&self, logical: &LogicalId) -> bool {
        self.shadow.contains(logical)
    }

    /// Size of the active set.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Size of the shadow set.
    pub fn shadow_len(&self) -> usize {
        self.shadow.len()
    }

    /// Recompute both sets from store state, without reporting flips.
    /// Used at startup and after structural writes between ticks.
    pub fn rebuild(&mut self, store: &GraphStore) {
        self.active = store.iterate_active().into_iter().collect();
        self.rebuild_shadow(store);
    }

    /// Recompute membership after a commit and report each crossing once.
    ///
    /// The returned flips are ordered by logical id, ups and downs
    /// interleaved in that order.
    pub fn apply_commit(&mut self, store: &GraphStore) -> Vec<Flip> {
        let new_active: BTreeSet<LogicalId> = store.iterate_active().into_iter().collect();
        let mut flips = Vec::new();

        for logical in new_active.difference(&self.active) {
            flips.push(Flip {
                logical_id: logical.clone(),
                direction: FlipDirection::Up,
            });
        }
        for logical in self.active.difference(&new_active) {
            flips.push(Flip {
                logical_id: logical.clone(),
                direction: FlipDirection::Down,
            });
        }
        flips.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));

        self.active = new_active;
        self.rebuild_shadow(store);
        flips
    }

    fn rebuild_shadow(&mut self, store: &GraphStore) {
        let mut shadow = BTreeSet::new();
        for source in &self.active {
            for link in store.adjacency_out(source) {
                if !self.active.contains(&link.dst) {
                    shadow.insert(link.dst);
                }
            }
        }
        self.shadow = shadow;
    }
}

// ============================================================================
// TESTS
// ============================================================================
