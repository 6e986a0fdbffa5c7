//! Transport-agnostic command/query surface.
//!
//! External collaborators drive the runtime through these shapes only.
//! Commands mutate; queries read. Both are plain serde types so any
//! transport (channel, pipe, HTTP sidecar) can carry them. Inputs use
//! `deny_unknown_fields` so shape drift fails loudly at the boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DecayProfile;
use crate::graph::{LinkVersion, LogicalId, NodeType, NodeVersion, VersionId};
use crate::stimulus::{InjectReport, InjectRequest};

// ============================================================================
// COMMANDS
// ============================================================================

/// Mutations accepted by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Create the first version of a node
    CreateNode {
        /// Stable identity chosen by the caller
        logical: LogicalId,
        /// Type name; must parse into the enumerated set
        node_type: String,
        /// Human-readable description
        description: String,
        /// Opaque metadata
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<Map<String, Value>>,
        /// Reality interval start; defaults to now
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valid_from: Option<DateTime<Utc>>,
    },
    /// Replace the live version of a node
    SupersedeNode {
        /// Stable identity
        logical: LogicalId,
        /// Replacement description
        new_description: String,
        /// Replacement metadata; keeps the old when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_meta: Option<Map<String, Value>>,
        /// Replacement reality start; defaults to now
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_valid_from: Option<DateTime<Utc>>,
    },
    /// Create the first version of a link
    CreateLink {
        /// Source logical id
        src: LogicalId,
        /// Destination logical id
        dst: LogicalId,
        /// Type name; must parse into the enumerated set
        link_type: String,
        /// Initial learned weight (log units)
        #[serde(default)]
        weight_log: f64,
        /// Confidence in [0, 1]
        #[serde(default = "default_confidence")]
        confidence: f64,
        /// Reality interval start; defaults to now
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valid_from: Option<DateTime<Utc>>,
    },
    /// Replace the live version of a link
    SupersedeLink {
        /// Source logical id
        src: LogicalId,
        /// Destination logical id
        dst: LogicalId,
        /// Replacement type name, if changing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_link_type: Option<String>,
        /// Replacement confidence, if changing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_confidence: Option<f64>,
        /// Replacement reality start; defaults to now
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_valid_from: Option<DateTime<Utc>>,
    },
    /// Inject stimulus energy
    Inject(InjectRequest),
    /// Hot-reload decay profiles
    ConfigureDecay {
        /// Replacement per-type profiles
        type_profiles: HashMap<NodeType, DecayProfile>,
        /// Replacement weight-decay cadence, if changing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight_cadence_ticks: Option<u64>,
    },
    /// Hot-reload the criticality controller
    ConfigureCriticality {
        /// Target spectral radius
        target: f64,
        /// Proportional gain
        k_p: f64,
        /// Optional diffusion-share gain
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k_alpha: Option<f64>,
        /// Power-iteration cadence in ticks, if changing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cadence: Option<u64>,
    },
}

fn default_confidence() -> f64 {
    1.0
}

/// What a successfully applied command produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandOutcome {
    /// A version-creating write landed
    Created {
        /// The fresh version
        version_id: VersionId,
    },
    /// A supersession landed
    Superseded {
        /// Closed version
        old_version: VersionId,
        /// New live version
        new_version: VersionId,
    },
    /// An injection landed
    Injected(InjectReport),
    /// A configuration section was swapped
    Configured,
}

// ============================================================================
// QUERIES
// ============================================================================

/// Reads accepted by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueryRequest {
    /// Resolve a node as of an instant on an axis
    AsOfNode {
        /// Stable identity
        logical: LogicalId,
        /// Axis name: "reality" or "knowledge"
        axis: String,
        /// Query instant
        instant: DateTime<Utc>,
    },
    /// Resolve a link as of an instant on an axis
    AsOfLink {
        /// Source logical id
        src: LogicalId,
        /// Destination logical id
        dst: LogicalId,
        /// Axis name: "reality" or "knowledge"
        axis: String,
        /// Query instant
        instant: DateTime<Utc>,
    },
    /// Full version chain of a node, oldest first
    History {
        /// Stable identity
        logical: LogicalId,
    },
    /// Inject, run ticks, and report the reconstructed pattern
    ContextReconstruct(ContextReconstructRequest),
    /// Diagnostic frontier/energy snapshot
    Snapshot {},
}

/// Input for context reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContextReconstructRequest {
    /// Entry points with budget shares summing to 1
    pub entry_targets: Vec<(LogicalId, f64)>,
    /// Stimulus budget
    pub budget: f64,
    /// Upper bound on ticks to run
    pub max_ticks: u32,
    /// Optional reference pattern to score against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_snapshot: Option<ReferenceSnapshot>,
}

/// A reference activation pattern for similarity scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReferenceSnapshot {
    /// Expected energies keyed by logical id
    pub energies: Vec<(LogicalId, f64)>,
}

// ============================================================================
// QUERY RESULTS
// ============================================================================

/// One (energy, threshold) diagnostic sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSample {
    /// Node identity
    pub logical_id: LogicalId,
    /// Current activation energy
    pub energy: f64,
    /// Current threshold
    pub threshold: f64,
}

/// Diagnostic frontier snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    /// Active set in id order
    pub active: Vec<LogicalId>,
    /// Shadow set in id order
    pub shadow: Vec<LogicalId>,
    /// Bounded sample of (energy, threshold) pairs, highest energy first
    pub sample: Vec<NodeSample>,
}

/// An approximate entity: a top-degree hub and its active neighborhood.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    /// Hub node
    pub hub: LogicalId,
    /// Active out-neighbors of the hub
    pub members: Vec<LogicalId>,
    /// Mean energy over hub and members
    pub mean_energy: f64,
}

/// Result of a context reconstruction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReconstructReport {
    /// Ticks actually run
    pub ticks_run: u32,
    /// Nodes above threshold with their final energies
    pub nodes_above_threshold: Vec<NodeSample>,
    /// Approximate entities as top-degree neighborhoods
    pub entity_summary: Vec<EntitySummary>,
    /// Cosine similarity against the reference, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Aggregate runtime statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Logical nodes with a live version
    pub node_count: usize,
    /// Logical links with a live version
    pub link_count: usize,
    /// Total version rows, live or superseded
    pub version_count: usize,
    /// Active-set size
    pub active_count: usize,
    /// Shadow-set size
    pub shadow_count: usize,
    /// Ticks run so far
    pub tick_id: u64,
    /// Last emitted event sequence number
    pub last_seq: u64,
    /// Events dropped off the replay buffer
    pub dropped_events: u64,
    /// Mean energy per node type
    pub mean_energy_by_type: HashMap<NodeType, f64>,
}

/// Payload of a query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueryResult {
    /// As-of node resolution
    Node {
        /// The resolved version, if any
        version: Option<NodeVersion>,
    },
    /// As-of link resolution
    Link {
        /// The resolved version, if any
        version: Option<LinkVersion>,
    },
    /// Version chain
    History {
        /// Oldest-to-newest versions
        versions: Vec<NodeVersion>,
    },
    /// Context reconstruction output
    Context(ContextReconstructReport),
    /// Diagnostic snapshot
    Snapshot(SnapshotReport),
}

/// A query response, flagged partial when the soft deadline was missed and
/// the runtime answered with the best snapshot it could take.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The payload
    pub result: QueryResult,
    /// True when served past the caller's deadline
    pub partial: bool,
}

// ============================================================================
// TESTS
// ============================================================================
