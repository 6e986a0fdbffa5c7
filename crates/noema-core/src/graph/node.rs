//! Node versions and runtime activation state.
//!
//! A node is a logical identity with a chain of immutable versions. The
//! version rows carry the bitemporal record (reality and knowledge
//! intervals); the fast-changing activation state lives in a separate
//! [`NodeRuntime`] record keyed by logical id and is never part of a version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{LogicalId, VersionId};

// ============================================================================
// NODE TYPES
// ============================================================================

/// Classifier affecting decay rates and resistance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Long-lived knowledge; decays slowly
    Memory,
    /// Work item; decays fast once stale
    Task,
    /// Anything without a more specific classification
    #[default]
    Default,
}

impl NodeType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Memory => "memory",
            NodeType::Task => "task",
            NodeType::Default => "default",
        }
    }

    /// Parse from string name. Unknown names are rejected so that callers
    /// surface `TypeUnknown` instead of silently reclassifying.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(NodeType::Memory),
            "task" => Some(NodeType::Task),
            "default" => Some(NodeType::Default),
            _ => None,
        }
    }

    /// All known node types.
    pub fn all() -> [NodeType; 3] {
        [NodeType::Memory, NodeType::Task, NodeType::Default]
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// NODE VERSION
// ============================================================================

/// One immutable version of a node.
///
/// The reality interval (`valid_from`/`valid_to`) records when the fact was
/// true in the modeled world; the knowledge interval (`known_from`/`known_to`)
/// records when the system believed it. `None` on an end means the interval
/// is still open.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVersion {
    /// Stable identity across versions
    pub logical_id: LogicalId,
    /// Unique id of this version
    pub version_id: VersionId,
    /// Monotonic per-logical-id sequence number
    pub version_seq: u32,
    /// Classifier affecting decay and resistance
    pub node_type: NodeType,
    /// Human-readable description of the fact
    pub description: String,
    /// Opaque caller-owned metadata
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Start of the reality interval
    pub valid_from: DateTime<Utc>,
    /// End of the reality interval (None = still true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    /// Start of the knowledge interval
    pub known_from: DateTime<Utc>,
    /// End of the knowledge interval (None = current belief)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_to: Option<DateTime<Utc>>,
    /// Version this one replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<VersionId>,
    /// Version that replaced this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<VersionId>,
}

impl NodeVersion {
    /// Whether this version is the current belief (knowledge interval open).
    pub fn is_live(&self) -> bool {
        self.known_to.is_none()
    }

    /// Whether the fact was true in the modeled world at `t`.
    pub fn valid_at(&self, t: DateTime<Utc>) -> bool {
        self.valid_from <= t && self.valid_to.is_none_or(|end| end > t)
    }

    /// Whether the system believed this version at `t`.
    pub fn known_at(&self, t: DateTime<Utc>) -> bool {
        self.known_from <= t && self.known_to.is_none_or(|end| end > t)
    }
}

// ============================================================================
// RUNTIME STATE
// ============================================================================

/// Fast-changing per-node state owned by the tick loop.
///
/// Never persisted inside a version row: energies are recomputable from
/// stimuli and learned weights, and versions stay immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRuntime {
    /// Activation energy, clamped to [0, 1]
    pub energy: f64,
    /// Learned long-run weight attractor (natural log units, slow-changing)
    pub weight_log: f64,
    /// Activation threshold in (0, 1]
    pub threshold: f64,
}

/// Default activation threshold for freshly created nodes.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

impl Default for NodeRuntime {
    fn default() -> Self {
        Self {
            energy: 0.0,
            weight_log: 0.0,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl NodeRuntime {
    /// Whether this node currently meets its activation threshold.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.energy >= self.threshold
    }

    /// Gap to threshold, clamped to zero when already active.
    #[inline]
    pub fn threshold_gap(&self) -> f64 {
        (self.threshold - self.energy).max(0.0)
    }
}

/// Bounded write used wherever raw energy arithmetic can overshoot.
///
/// Negative raw values floor at zero; positive values approach 1 smoothly.
#[inline]
pub fn saturate(raw: f64) -> f64 {
    (2.0 * raw.max(0.0)).tanh()
}

// ============================================================================
// TESTS
// ============================================================================
