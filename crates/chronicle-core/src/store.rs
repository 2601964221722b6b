//! Event store contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event::{AggregateId, EventRecord, EventTypeTag};

/// Batch size used by `get_events_by_type` when the caller passes `0`.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// One page of a type-indexed scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Records in ascending timestamp order.
    pub events: Vec<EventRecord>,
    /// Timestamp of the last record in `events`, or `0` when empty.
    pub latest: i64,
}

impl EventBatch {
    /// Builds a batch, deriving `latest` from the last record.
    #[must_use]
    pub fn new(events: Vec<EventRecord>) -> Self {
        let latest = events.last().map_or(0, |e| e.timestamp);
        Self { events, latest }
    }

    /// Returns `true` if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Storage contract every backend honors identically.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Loads all records for `aggregate_id` in append order. An id that was
    /// never written yields an empty vector, not an error.
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError>;

    /// Appends `events` atomically, provided the stored version of
    /// `aggregate_id` equals `expected_version`.
    ///
    /// On success the version becomes `expected_version + events.len()` and
    /// every record without a timestamp gets one. On mismatch the store is
    /// left unchanged and `DomainError::ConcurrencyConflict` is returned.
    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError>;

    /// Returns up to `batch_size` records tagged `type_tag` whose timestamp is
    /// strictly greater than `since` (all records when `since` is `0`), in
    /// ascending timestamp order.
    ///
    /// Callers resume a scan by passing the returned `latest` back as
    /// `since`. Records sharing a timestamp with the cursor are excluded.
    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        (**self).find(aggregate_id).await
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        (**self).update(aggregate_id, expected_version, events).await
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        (**self).get_events_by_type(type_tag, since, batch_size).await
    }
}

/// Largest timestamp a caller may supply: 9999-12-31T23:59:59.999Z in
/// milliseconds. Keeps store-assigned successors representable.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799_999;

/// Checks a batch before any backend touches storage: every record must
/// belong to `aggregate_id` and any caller-supplied timestamp must lie in
/// `1..=MAX_TIMESTAMP`.
///
/// # Errors
///
/// Returns `DomainError::Validation` naming the first offending record.
pub fn validate_append(
    aggregate_id: &AggregateId,
    events: &[EventRecord],
) -> Result<(), DomainError> {
    for event in events {
        if &event.aggregate_id != aggregate_id {
            return Err(DomainError::Validation(format!(
                "event for aggregate {} cannot be appended to {aggregate_id}",
                event.aggregate_id
            )));
        }
        if !(0..=MAX_TIMESTAMP).contains(&event.timestamp) {
            return Err(DomainError::Validation(format!(
                "timestamp {} of {} event for {aggregate_id} is outside 1..={MAX_TIMESTAMP}",
                event.timestamp, event.type_tag
            )));
        }
    }
    Ok(())
}

/// Picks the store-assigned timestamp for a record whose tag currently ends
/// at `latest`: `max(now, latest + 1)`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `latest + 1` does not fit in an `i64`.
pub fn next_timestamp(now: i64, latest: i64) -> Result<i64, DomainError> {
    latest
        .checked_add(1)
        .map(|successor| now.max(successor))
        .ok_or_else(|| DomainError::Validation(format!("no timestamp left after {latest}")))
}

/// Normalizes a requested batch size.
#[must_use]
pub fn effective_batch_size(batch_size: usize) -> usize {
    if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    }
}
