//! Runtime - engine assembly, tick loop, command/query surface
//!
//! The engine is the one process-wide runtime state; the service module
//! puts it on its own task behind an inbox for the single-writer model.

mod commands;
mod engine;
mod service;

pub use commands::{
    Command, CommandOutcome, ContextReconstructReport, ContextReconstructRequest, EngineStats,
    EntitySummary, NodeSample, QueryRequest, QueryResponse, QueryResult, ReferenceSnapshot,
    SnapshotReport,
};
pub use engine::{Engine, TickSummary};
pub use service::{EngineHandle, EngineService};
