//! Event type registry: the bidirectional tag ↔ shape mapping for one
//! aggregate type's event vocabulary.
//!
//! A registry is built from an explicit mapping table and verified to be a
//! bijection when it is constructed, so a bad table fails at startup rather
//! than on the first unlucky read. Lookups that miss are hard errors
//! (`UnknownEventTag` / `UnknownEventShape`); they are never treated as
//! "no event".

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::DomainError;
use crate::event::{AggregateId, DomainEvent, EventRecord, EventTypeTag};

/// Bidirectional mapping between type tags and the event shapes of `E`.
#[derive(Debug, Clone)]
pub struct EventRegistry<E> {
    by_tag: HashMap<EventTypeTag, &'static str>,
    by_type: HashMap<&'static str, EventTypeTag>,
    _event: PhantomData<fn() -> E>,
}

impl<E: DomainEvent> EventRegistry<E> {
    /// Builds a registry from `(tag, event_type)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRegistry` if a tag is not positive, or if
    /// a tag or an event type appears more than once.
    pub fn new(entries: &[(EventTypeTag, &'static str)]) -> Result<Self, DomainError> {
        let mut by_tag = HashMap::with_capacity(entries.len());
        let mut by_type = HashMap::with_capacity(entries.len());

        for &(tag, event_type) in entries {
            if tag.0 <= 0 {
                return Err(DomainError::InvalidRegistry(format!(
                    "tag {tag} for {event_type} must be positive"
                )));
            }
            if let Some(existing) = by_tag.insert(tag, event_type) {
                return Err(DomainError::InvalidRegistry(format!(
                    "tag {tag} is mapped to both {existing} and {event_type}"
                )));
            }
            if let Some(existing) = by_type.insert(event_type, tag) {
                return Err(DomainError::InvalidRegistry(format!(
                    "{event_type} is mapped to both tag {existing} and tag {tag}"
                )));
            }
        }

        Ok(Self {
            by_tag,
            by_type,
            _event: PhantomData,
        })
    }

    /// Returns the type tag for `event`'s shape.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventShape` if the shape is not registered.
    pub fn encode(&self, event: &E) -> Result<EventTypeTag, DomainError> {
        let event_type = event.event_type();
        self.by_type
            .get(event_type)
            .copied()
            .ok_or_else(|| DomainError::UnknownEventShape(event_type.to_owned()))
    }

    /// Returns the event shape registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventTag` if the tag is not registered.
    pub fn decode(&self, tag: EventTypeTag) -> Result<&'static str, DomainError> {
        self.by_tag
            .get(&tag)
            .copied()
            .ok_or(DomainError::UnknownEventTag(tag))
    }

    /// Returns every registered tag in ascending order.
    #[must_use]
    pub fn tags(&self) -> Vec<EventTypeTag> {
        let mut tags: Vec<EventTypeTag> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Encodes `event` into a record for `aggregate_id`, leaving the
    /// timestamp for the store to assign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventShape` or
    /// `DomainError::Serialization`.
    pub fn to_record(
        &self,
        aggregate_id: &AggregateId,
        event: &E,
    ) -> Result<EventRecord, DomainError> {
        let tag = self.encode(event)?;
        let payload = event.to_payload()?;
        Ok(EventRecord::new(aggregate_id.clone(), tag, payload))
    }

    /// Decodes a stored record back into an event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventTag` or `DomainError::Serialization`.
    pub fn from_record(&self, record: &EventRecord) -> Result<E, DomainError> {
        let event_type = self.decode(record.type_tag)?;
        E::from_payload(event_type, record.payload.clone())
    }
}
