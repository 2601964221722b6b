//! Domain error types.

use thiserror::Error;

use crate::event::{AggregateId, EventTypeTag};

/// Top-level domain error type.
///
/// Stores, the repository and command handlers all return this type and pass
/// it through unchanged, so callers can always tell a concurrency conflict
/// from a domain rule violation or a transient storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// Optimistic concurrency conflict: the expected version did not match
    /// the stored version at the time of the append.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: AggregateId,
        /// The version the writer expected.
        expected: i64,
        /// The version found in the store.
        actual: i64,
    },

    /// A business operation was attempted on an aggregate in a terminal state.
    #[error("aggregate {0} is already in a terminal state")]
    AlreadyTerminal(AggregateId),

    /// A stored event carries a type tag the registry does not know.
    #[error("unknown event type tag: {0}")]
    UnknownEventTag(EventTypeTag),

    /// An event shape has no registered type tag.
    #[error("unknown event shape: {0}")]
    UnknownEventShape(String),

    /// A registry mapping table is not a bijection.
    #[error("invalid event registry: {0}")]
    InvalidRegistry(String),

    /// An event payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A store call did not complete within its time budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for failures of the underlying medium that a caller may
    /// retry as-is (timeouts, connectivity). Conflicts are not transient: the
    /// caller has to reload and re-apply its business logic first.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Infrastructure(_))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
