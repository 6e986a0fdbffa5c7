//! Opaque identifiers for logical entities and immutable versions.
//!
//! All structural references in the graph are by id; the store resolves them
//! at read time. Version chains and links never hold direct back-references.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// LOGICAL ID
// ============================================================================

/// Stable identifier for a node or link endpoint across versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Wrap an externally chosen logical id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LogicalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// VERSION ID
// ============================================================================

/// Identifier of one immutable version of a node or link (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Mint a fresh version id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// LINK KEY
// ============================================================================

/// Directed endpoint pair identifying a logical link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    /// Source logical id
    pub src: LogicalId,
    /// Destination logical id
    pub dst: LogicalId,
}

impl LinkKey {
    /// Build a key from endpoints.
    pub fn new(src: impl Into<LogicalId>, dst: impl Into<LogicalId>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

// ============================================================================
// TESTS
// ============================================================================
