//! In-memory implementation of the `EventStore` trait.
//!
//! Two indexes are kept: records per aggregate (source of truth for `find`
//! and versions) and records per type tag sorted by timestamp (source for
//! `get_events_by_type`). Both live behind one `RwLock`, so the version check
//! and the append to both indexes form a single critical section and readers
//! never see part of a batch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::{
    EventBatch, EventStore, effective_batch_size, next_timestamp, validate_append,
};

#[derive(Debug, Default)]
struct Catalogue {
    by_aggregate: HashMap<AggregateId, Vec<EventRecord>>,
    by_type: HashMap<EventTypeTag, Vec<EventRecord>>,
}

impl Catalogue {
    #[allow(clippy::cast_possible_wrap)]
    fn version(&self, aggregate_id: &AggregateId) -> i64 {
        self.by_aggregate
            .get(aggregate_id)
            .map_or(0, |events| events.len() as i64)
    }

    fn latest_timestamp(&self, type_tag: EventTypeTag) -> i64 {
        self.by_type
            .get(&type_tag)
            .and_then(|events| events.last())
            .map_or(0, |e| e.timestamp)
    }

    /// Inserts into the type index, keeping it sorted by timestamp and
    /// placing equal timestamps after the ones already present.
    fn index_by_type(&mut self, record: EventRecord) {
        let events = self.by_type.entry(record.type_tag).or_default();
        let position = events.partition_point(|e| e.timestamp <= record.timestamp);
        events.insert(position, record);
    }
}

/// Thread-safe in-memory event store.
pub struct InMemoryEventStore {
    catalogue: RwLock<Catalogue>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore").finish_non_exhaustive()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    /// Creates an empty store stamping events with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            catalogue: RwLock::new(Catalogue::default()),
            clock,
        }
    }

    /// Returns the current version of `aggregate_id`.
    pub async fn version(&self, aggregate_id: &AggregateId) -> i64 {
        self.catalogue.read().await.version(aggregate_id)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        let catalogue = self.catalogue.read().await;
        let events = catalogue
            .by_aggregate
            .get(aggregate_id)
            .cloned()
            .unwrap_or_default();
        debug!(%aggregate_id, events = events.len(), "find");
        Ok(events)
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        validate_append(aggregate_id, events)?;

        let mut catalogue = self.catalogue.write().await;

        let actual = catalogue.version(aggregate_id);
        if actual != expected_version {
            warn!(%aggregate_id, expected_version, actual, "optimistic concurrency conflict");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let now = self.clock.now_millis();
        let mut latest_by_tag: HashMap<EventTypeTag, i64> = HashMap::new();
        let mut stamped = Vec::with_capacity(events.len());
        for event in events {
            let mut record = event.clone();
            let latest = latest_by_tag
                .get(&record.type_tag)
                .copied()
                .unwrap_or_else(|| catalogue.latest_timestamp(record.type_tag));
            if !record.has_timestamp() {
                record.timestamp = next_timestamp(now, latest)?;
            }
            latest_by_tag.insert(record.type_tag, latest.max(record.timestamp));
            stamped.push(record);
        }

        // Nothing below can fail, so the batch lands in both indexes or not
        // at all.
        for record in &stamped {
            catalogue.index_by_type(record.clone());
        }
        catalogue
            .by_aggregate
            .entry(aggregate_id.clone())
            .or_default()
            .extend(stamped);

        info!(
            %aggregate_id,
            expected_version,
            appended = events.len(),
            "events appended"
        );
        Ok(())
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        let catalogue = self.catalogue.read().await;
        let Some(indexed) = catalogue.by_type.get(&type_tag) else {
            return Ok(EventBatch::default());
        };

        let start = if since == 0 {
            0
        } else {
            indexed.partition_point(|e| e.timestamp <= since)
        };
        let events: Vec<EventRecord> = indexed
            .iter()
            .skip(start)
            .take(effective_batch_size(batch_size))
            .cloned()
            .collect();

        debug!(%type_tag, since, returned = events.len(), "scan by type");
        Ok(EventBatch::new(events))
    }
}
