//! Command abstractions.

use crate::event::AggregateId;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// The aggregate this command targets.
    fn aggregate_id(&self) -> &AggregateId;
}
