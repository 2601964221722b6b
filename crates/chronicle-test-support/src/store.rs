//! Mock `EventStore` implementations for tests.

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::{EventBatch, EventStore, effective_batch_size};

/// An event store that records every `update` call. Returns the configured
/// records from `find` on every call and always accepts appends.
#[derive(Debug)]
pub struct RecordingEventStore {
    find_result: Vec<EventRecord>,
    updates: Mutex<Vec<(AggregateId, i64, Vec<EventRecord>)>>,
}

impl RecordingEventStore {
    /// Create a recording store that returns `find_result` from every `find`.
    #[must_use]
    pub fn new(find_result: Vec<EventRecord>) -> Self {
        Self {
            find_result,
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of every accepted `update` call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn updates(&self) -> Vec<(AggregateId, i64, Vec<EventRecord>)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn find(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        Ok(self.find_result.clone())
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        self.updates
            .lock()
            .unwrap()
            .push((aggregate_id.clone(), expected_version, events.to_vec()));
        Ok(())
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        let events = self
            .find_result
            .iter()
            .filter(|e| e.type_tag == type_tag && (since == 0 || e.timestamp > since))
            .take(effective_batch_size(batch_size))
            .cloned()
            .collect();
        Ok(EventBatch::new(events))
    }
}

/// An event store that holds nothing and silently accepts appends. Useful
/// for "aggregate not found" scenarios and creation commands.
#[derive(Debug)]
pub struct EmptyEventStore;

#[async_trait]
impl EventStore for EmptyEventStore {
    async fn find(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        Ok(vec![])
    }

    async fn update(
        &self,
        _aggregate_id: &AggregateId,
        _expected_version: i64,
        _events: &[EventRecord],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn get_events_by_type(
        &self,
        _type_tag: EventTypeTag,
        _since: i64,
        _batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        Ok(EventBatch::default())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn find(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn update(
        &self,
        _aggregate_id: &AggregateId,
        _expected_version: i64,
        _events: &[EventRecord],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get_events_by_type(
        &self,
        _type_tag: EventTypeTag,
        _since: i64,
        _batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// An event store that serves the configured records from `find` but
/// rejects every append as if another writer had already reached
/// `actual_version`.
#[derive(Debug)]
pub struct ConflictingEventStore {
    find_result: Vec<EventRecord>,
    actual_version: i64,
}

impl ConflictingEventStore {
    /// Create a store whose appends always conflict with `actual_version`.
    #[must_use]
    pub fn new(find_result: Vec<EventRecord>, actual_version: i64) -> Self {
        Self {
            find_result,
            actual_version,
        }
    }
}

#[async_trait]
impl EventStore for ConflictingEventStore {
    async fn find(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        Ok(self.find_result.clone())
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        _events: &[EventRecord],
    ) -> Result<(), DomainError> {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id: aggregate_id.clone(),
            expected: expected_version,
            actual: self.actual_version,
        })
    }

    async fn get_events_by_type(
        &self,
        _type_tag: EventTypeTag,
        _since: i64,
        _batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        Ok(EventBatch::default())
    }
}

/// Wraps another store and fails scheduled calls to `get_events_by_type`
/// with an infrastructure error, delegating every other call. Every scan,
/// failed or not, is recorded with the cursor it was given and the instant
/// it arrived.
pub struct FlakyEventStore<S> {
    inner: S,
    schedule: Vec<bool>,
    scans: Mutex<Vec<(EventTypeTag, i64, Instant)>>,
}

impl<S> FlakyEventStore<S> {
    /// Create a store that fails `failures` scans before recovering.
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self::with_schedule(inner, vec![true; failures])
    }

    /// Create a store whose `n`th scan fails when `schedule[n]` is `true`.
    /// Scans past the end of the schedule succeed.
    #[must_use]
    pub fn with_schedule(inner: S, schedule: Vec<bool>) -> Self {
        Self {
            inner,
            schedule,
            scans: Mutex::new(Vec::new()),
        }
    }

    /// Returns every `(type_tag, since)` pair passed to
    /// `get_events_by_type`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn scans(&self) -> Vec<(EventTypeTag, i64)> {
        self.scans
            .lock()
            .unwrap()
            .iter()
            .map(|&(type_tag, since, _)| (type_tag, since))
            .collect()
    }

    /// Returns the instant each scan arrived, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn scan_times(&self) -> Vec<Instant> {
        self.scans.lock().unwrap().iter().map(|&(_, _, at)| at).collect()
    }
}

#[async_trait]
impl<S: EventStore> EventStore for FlakyEventStore<S> {
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        self.inner.find(aggregate_id).await
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        self.inner
            .update(aggregate_id, expected_version, events)
            .await
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        let call = {
            let mut scans = self.scans.lock().unwrap();
            scans.push((type_tag, since, Instant::now()));
            scans.len() - 1
        };

        if self.schedule.get(call).copied().unwrap_or(false) {
            return Err(DomainError::Infrastructure("store unavailable".into()));
        }

        self.inner
            .get_events_by_type(type_tag, since, batch_size)
            .await
    }
}
