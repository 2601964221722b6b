//! Domain event abstractions and the stored event record.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Opaque, caller-supplied aggregate identifier (typically a UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AggregateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for AggregateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AggregateId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<Uuid> for AggregateId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Stable integer identifying one concrete event shape within an
/// aggregate's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTypeTag(pub i32);

impl fmt::Display for EventTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored representation of a domain event.
///
/// The payload is opaque to every store: only the registry of the owning
/// aggregate type knows how to turn it back into an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Aggregate this event belongs to.
    pub aggregate_id: AggregateId,
    /// Type tag used to pick the payload shape when decoding.
    pub type_tag: EventTypeTag,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Milliseconds since the Unix epoch. `0` means "not yet assigned"; the
    /// store fills it in on append.
    #[serde(default)]
    pub timestamp: i64,
}

impl EventRecord {
    /// Creates a record without a timestamp.
    pub fn new(
        aggregate_id: impl Into<AggregateId>,
        type_tag: EventTypeTag,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            type_tag,
            payload,
            timestamp: 0,
        }
    }

    /// Sets an explicit timestamp, overriding store assignment.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns `true` once a timestamp has been assigned.
    #[must_use]
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != 0
    }
}

/// Trait that all domain event enums implement.
///
/// Each variant is one concrete event shape, named by `event_type`. The
/// registry maps those names to type tags; this trait only knows how to move
/// between a shape and its JSON payload.
pub trait DomainEvent: Clone + fmt::Debug + Send + Sync + 'static {
    /// Returns the event type name of this value's shape.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be encoded.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Rebuilds an event of shape `event_type` from its payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventShape` if the enum has no such shape
    /// and `DomainError::Serialization` if the payload does not fit it.
    fn from_payload(event_type: &str, payload: serde_json::Value) -> Result<Self, DomainError>;
}
