//! Diffusion engine - stride selection, staging, atomic commit
//!
//! One tick's diffusion is: snapshot active sources, select bounded
//! candidate sets per source, stage capped transfers into the delta buffer,
//! then commit every delta at once. Standardized weight reads make scores
//! comparable across link types.

mod fanout;
mod stats;
mod stride;

pub use fanout::{Candidate, FanoutSelector, SelectionReason};
pub use stats::{TypeWeightStats, WeightStats, STANDARDIZE_EPSILON};
pub use stride::{
    commit, execute_strides, CommitOutcome, DeltaBuffer, DiffusionPass, StrideRecord,
};
