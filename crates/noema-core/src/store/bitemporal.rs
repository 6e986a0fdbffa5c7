//! Bitemporal axis semantics shared by node and link chains.
//!
//! Two timelines per version: the reality interval (`valid_*`, when the fact
//! was true in the modeled world) and the knowledge interval (`known_*`, when
//! the system believed it). Supersession closes the knowledge interval of the
//! old version and opens a new one; reality intervals are caller-supplied and
//! may be retroactive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::{LinkVersion, NodeVersion};

// ============================================================================
// TIME AXIS
// ============================================================================

/// Which timeline an as-of query runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeAxis {
    /// When the fact was true in the modeled world (`valid_*`)
    Reality,
    /// When the system believed the fact (`known_*`)
    Knowledge,
}

impl TimeAxis {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeAxis::Reality => "reality",
            TimeAxis::Knowledge => "knowledge",
        }
    }

    /// Parse from string name; unknown names are rejected.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reality" => Some(TimeAxis::Reality),
            "knowledge" => Some(TimeAxis::Knowledge),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TEMPORAL RECORD
// ============================================================================

/// Accessor seam over node and link versions so as-of resolution is written
/// once. Implementors expose interval predicates only; resolution never
/// inspects payload fields.
pub trait TemporalRecord {
    /// Whether the version is the current belief (knowledge interval open).
    fn is_live(&self) -> bool;
    /// Whether the fact was true in the modeled world at `t`.
    fn valid_at(&self, t: DateTime<Utc>) -> bool;
    /// Whether the system believed this version at `t`.
    fn known_at(&self, t: DateTime<Utc>) -> bool;
}

impl TemporalRecord for NodeVersion {
    fn is_live(&self) -> bool {
        NodeVersion::is_live(self)
    }
    fn valid_at(&self, t: DateTime<Utc>) -> bool {
        NodeVersion::valid_at(self, t)
    }
    fn known_at(&self, t: DateTime<Utc>) -> bool {
        NodeVersion::known_at(self, t)
    }
}

impl TemporalRecord for LinkVersion {
    fn is_live(&self) -> bool {
        LinkVersion::is_live(self)
    }
    fn valid_at(&self, t: DateTime<Utc>) -> bool {
        LinkVersion::valid_at(self, t)
    }
    fn known_at(&self, t: DateTime<Utc>) -> bool {
        LinkVersion::known_at(self, t)
    }
}

/// Resolve a version chain as of `instant` on the given axis.
///
/// Knowledge axis: the version whose knowledge interval covers `instant`.
/// Chains close one knowledge interval before opening the next, so at most
/// one version matches.
///
/// Reality axis: evaluated under current knowledge. The live version is
/// returned when its reality interval covers `instant`; versions the system
/// no longer believes do not resolve.
pub fn resolve_as_of<'a, T, I>(chain: I, axis: TimeAxis, instant: DateTime<Utc>) -> Option<&'a T>
where
    T: TemporalRecord + 'a,
    I: IntoIterator<Item = &'a T>,
{
    match axis {
        TimeAxis::Knowledge => chain.into_iter().find(|v| v.known_at(instant)),
        TimeAxis::Reality => chain
            .into_iter()
            .find(|v| v.is_live())
            .filter(|v| v.valid_at(instant)),
    }
}

// ============================================================================
// INTERVAL VALIDATION
// ============================================================================

/// Reject inputs that would break interval monotonicity.
///
/// `known_from <= known_to` and `valid_from <= valid_to` whenever both ends
/// are defined. No partial writes happen after a rejection.
pub fn check_intervals(
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    known_from: DateTime<Utc>,
    known_to: Option<DateTime<Utc>>,
) -> Result<()> {
    if let Some(end) = valid_to {
        if valid_from > end {
            return Err(EngineError::IntervalInvariantViolation(format!(
                "valid_from {valid_from} after valid_to {end}"
            )));
        }
    }
    if let Some(end) = known_to {
        if known_from > end {
            return Err(EngineError::IntervalInvariantViolation(format!(
                "known_from {known_from} after known_to {end}"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
