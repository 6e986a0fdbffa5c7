//! # Noema Core
//!
//! Consciousness graph runtime: a versioned, bitemporally tracked property
//! graph whose nodes carry a single scalar activation energy and whose edges
//! carry learnable weights, advanced one tick at a time.
//!
//! - **Bitemporal Versioning**: Reality and knowledge timelines per version,
//!   immutable supersessions, as-of queries on either axis
//! - **Stride Diffusion**: Two-scale traversal over an active/shadow
//!   frontier with staged deltas and atomic commit
//! - **Criticality Control**: Spectral-radius estimation (power iteration +
//!   branching-ratio proxy) steering decay and diffusion levers
//! - **Type-Dependent Decay**: Per-type activation and weight decay on
//!   independent clocks
//! - **Hebbian Strengthening**: Inactive-only link learning with
//!   standardized weight reads and a soft ceiling
//! - **Structured Events**: A strictly ordered, closed-set event stream
//!   with per-type aggregate histograms
//!
//! ## Quick Start
//!
//! ```rust
//! use noema_core::{Engine, EngineConfig, InjectRequest, LogicalId, StimulusTarget};
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//!
//! // Build a tiny graph.
//! engine.create_node(LogicalId::new("coffee"), "memory", "morning ritual".into(), None, None)?;
//! engine.create_node(LogicalId::new("focus"), "memory", "deep work".into(), None, None)?;
//! engine.create_link(LogicalId::new("coffee"), LogicalId::new("focus"), "association", 0.0, 1.0, None)?;
//!
//! // Light it up and advance a frame.
//! engine.inject(&InjectRequest {
//!     targets: vec![StimulusTarget { logical: LogicalId::new("coffee"), weight: 1.0 }],
//!     budget: 0.8,
//!     deadline: None,
//!     affect: None,
//! })?;
//! let summary = engine.tick_with_dt(1.0);
//! assert!(summary.strides > 0);
//! # Ok::<(), noema_core::EngineError>(())
//! ```
//!
//! ## Concurrency Model
//!
//! Single-writer, many-readers: one task owns the tick loop and is the sole
//! mutator of energies, frontier sets, and staged deltas. Use
//! [`EngineService::spawn`] to run the engine on its own task behind a
//! command inbox; readers consume the broadcast event stream.

#![cfg_attr(docsrs, feature(doc_cfg))]
// Only warn about missing docs for public items exported from the crate root
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod criticality;
pub mod decay;
pub mod diffusion;
pub mod error;
pub mod events;
pub mod frontier;
pub mod graph;
pub mod learning;
pub mod runtime;
pub mod scheduler;
pub mod stimulus;
pub mod store;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Graph data model
pub use graph::{
    saturate, LinkKey, LinkRuntime, LinkType, LinkVersion, LogicalId, NodeRuntime, NodeType,
    NodeVersion, ResolvedLink, VersionId, DEFAULT_THRESHOLD,
};

// Store and bitemporal layer
pub use store::{CreateReceipt, GraphStore, SupersedeReceipt, TemporalRecord, TimeAxis};

// Frontier
pub use frontier::{Flip, FlipDirection, Frontier};

// Diffusion
pub use diffusion::{
    Candidate, CommitOutcome, DeltaBuffer, DiffusionPass, FanoutSelector, SelectionReason,
    StrideRecord, TypeWeightStats, WeightStats,
};

// Decay
pub use decay::{
    apply_activation_decay, apply_weight_decay, DecaySummary, WeightDecaySummary,
};

// Criticality
pub use criticality::{
    coherence, sample_rho, CriticalityController, CriticalityUpdate, FlowObservation, SafetyState,
};

// Stimulus
pub use stimulus::{
    AffectVector, AppliedInjection, InjectReport, InjectRequest, StimulusInjector, StimulusTarget,
};

// Scheduler
pub use scheduler::TickScheduler;

// Learning
pub use learning::{LinkStrengthener, WeightUpdate};

// Events
pub use events::{
    energy_histograms, weight_histograms, EventEmitter, EventKind, EventRecord, TypeHistogram,
};

// Configuration
pub use config::{
    CriticalityConfig, DecayConfig, DecayProfile, DiffusionConfig, EngineConfig, EventConfig,
    FeatureFlags, InjectionConfig, LearningConfig, SchedulerConfig,
};

// Errors
pub use error::{EngineError, Result};

// Runtime surface
pub use runtime::{
    Command, CommandOutcome, ContextReconstructReport, ContextReconstructRequest, Engine,
    EngineHandle, EngineService, EngineStats, EntitySummary, NodeSample, QueryRequest,
    QueryResponse, QueryResult, ReferenceSnapshot, SnapshotReport, TickSummary,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default spectral-radius target
pub const DEFAULT_RHO_TARGET: f64 = 1.0;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Command, CommandOutcome, Engine, EngineConfig, EngineError, EngineHandle, EngineService,
        EngineStats, EventKind, EventRecord, InjectRequest, LinkType, LogicalId, NodeType,
        QueryRequest, QueryResult, Result, SafetyState, StimulusTarget, TickSummary, TimeAxis,
        VersionId,
    };
}
