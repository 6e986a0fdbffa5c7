//! Link versions and learnable link state.
//!
//! Links are directed edges between logical node ids. They carry no
//! activation energy; their learnable weight lives outside the version chain
//! in [`LinkRuntime`] so Hebbian updates never fork a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LogicalId, VersionId};

// ============================================================================
// LINK TYPES
// ============================================================================

/// Type of relationship between nodes. Affects learning priors and the
/// per-type weight standardization used by the diffusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// General association (co-activation)
    #[default]
    Association,
    /// Temporal relationship (happened before/after)
    Temporal,
    /// Causal relationship (A caused B)
    Causal,
    /// Derived knowledge (B is derived from A)
    Derived,
    /// Part-of relationship (A is part of B)
    PartOf,
}

impl LinkType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Association => "association",
            LinkType::Temporal => "temporal",
            LinkType::Causal => "causal",
            LinkType::Derived => "derived",
            LinkType::PartOf => "part_of",
        }
    }

    /// Parse from string name; unknown names are rejected.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "association" => Some(LinkType::Association),
            "temporal" => Some(LinkType::Temporal),
            "causal" => Some(LinkType::Causal),
            "derived" => Some(LinkType::Derived),
            "part_of" | "partof" => Some(LinkType::PartOf),
            _ => None,
        }
    }

    /// All known link types.
    pub fn all() -> [LinkType; 5] {
        [
            LinkType::Association,
            LinkType::Temporal,
            LinkType::Causal,
            LinkType::Derived,
            LinkType::PartOf,
        ]
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LINK VERSION
// ============================================================================

/// One immutable version of a directed link.
///
/// Endpoints are logical ids; as-of queries bind to the endpoint versions
/// active at the query instant, never to logical ids directly.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkVersion {
    /// Source logical id
    pub src: LogicalId,
    /// Destination logical id
    pub dst: LogicalId,
    /// Unique id of this version
    pub version_id: VersionId,
    /// Monotonic per-link sequence number
    pub version_seq: u32,
    /// Relationship classifier
    pub link_type: LinkType,
    /// Confidence in the relationship, in [0, 1]
    pub confidence: f64,
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

impl LinkVersion {
    /// Whether this version is the current belief.
    pub fn is_live(&self) -> bool {
        self.known_to.is_none()
    }

    /// Whether the relationship was true in the modeled world at `t`.
    pub fn valid_at(&self, t: DateTime<Utc>) -> bool {
        self.valid_from <= t && self.valid_to.is_none_or(|end| end > t)
    }

    /// Whether the system believed this version at `t`.
    pub fn known_at(&self, t: DateTime<Utc>) -> bool {
        self.known_from <= t && self.known_to.is_none_or(|end| end > t)
    }
}

// ============================================================================
// LINK RUNTIME STATE
// ============================================================================

/// Learnable per-link state stored outside the version chain.
///
/// `weight_log` is durable and slow-changing; strengthening updates it in
/// place. Versions record the relationship itself, not its learned strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRuntime {
    /// Learned weight in natural log units
    pub weight_log: f64,
}

impl Default for LinkRuntime {
    fn default() -> Self {
        Self { weight_log: 0.0 }
    }
}

/// A link as seen by traversal: live version plus learned weight.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    /// Source logical id
    pub src: LogicalId,
    /// Destination logical id
    pub dst: LogicalId,
    /// Live version id
    pub version_id: VersionId,
    /// Relationship classifier
    pub link_type: LinkType,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Current learned weight (log units)
    pub weight_log: f64,
}

// ============================================================================
// TESTS
// ============================================================================
