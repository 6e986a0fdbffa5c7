//! Graph data model - identities, versions, runtime state
//!
//! Implements the versioned property graph:
//! - Opaque logical and version identifiers
//! - Immutable node/link versions with bitemporal intervals
//! - Runtime activation state kept outside version rows
//! - Saturating energy writes

mod ids;
mod link;
mod node;

pub use ids::{LinkKey, LogicalId, VersionId};
pub use link::{LinkRuntime, LinkType, LinkVersion, ResolvedLink};
pub use node::{saturate, NodeRuntime, NodeType, NodeVersion, DEFAULT_THRESHOLD};
