//! Error taxonomy shared across the runtime.
//!
//! Mutations are either fully applied or fully rejected per logical id; the
//! one deliberate exception is a conservation breach inside a tick, which
//! suppresses learning for that tick but never rolls back the commit.

use crate::graph::LogicalId;

/// Runtime error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No live version for a logical id
    #[error("no live version for logical id: {0}")]
    NotFound(LogicalId),
    /// Create on an existing live version without supersession
    #[error("logical id already has a live version: {0}")]
    DuplicateLogical(LogicalId),
    /// Bitemporal interval invariants broken by input
    #[error("interval invariant violation: {0}")]
    IntervalInvariantViolation(String),
    /// Reference to a type outside the enumerated set
    #[error("unknown type: {0}")]
    TypeUnknown(String),
    /// Injection target does not resolve
    #[error("injection target does not resolve: {0}")]
    UnknownTarget(LogicalId),
    /// Injection budget negative or above the configured cap
    #[error("injection budget out of range: {0}")]
    BudgetOutOfRange(f64),
    /// Conservation or ordering invariant failed
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Tick in progress and deadline missed
    #[error("tick in progress and deadline missed")]
    Busy,
    /// Underlying store reported a retryable fault
    #[error("transient store fault: {0}")]
    Transient(String),
    /// Configuration value outside its documented range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Runtime result type
pub type Result<T> = std::result::Result<T, EngineError>;
