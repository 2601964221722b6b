//! Aggregate repository: loads aggregates by replay and saves them through
//! the store's optimistic-concurrency append.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aggregate::{Aggregate, AggregateRoot, AggregateState};
use crate::error::DomainError;
use crate::event::{AggregateId, EventRecord};
use crate::registry::EventRegistry;
use crate::store::EventStore;

/// The event type of aggregate root `A`.
pub type EventOf<A> = <<A as AggregateRoot>::State as AggregateState>::Event;

/// Binds an event store and a registry to one aggregate type.
pub struct AggregateRepository<A: AggregateRoot> {
    store: Arc<dyn EventStore>,
    registry: Arc<EventRegistry<EventOf<A>>>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: AggregateRoot> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            _aggregate: PhantomData,
        }
    }
}

impl<A: AggregateRoot> std::fmt::Debug for AggregateRepository<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<A: AggregateRoot> AggregateRepository<A> {
    /// Creates a repository over `store` using `registry` for encoding.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, registry: Arc<EventRegistry<EventOf<A>>>) -> Self {
        Self {
            store,
            registry,
            _aggregate: PhantomData,
        }
    }

    /// Returns the underlying event store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Returns the registry used for encoding and decoding.
    #[must_use]
    pub fn registry(&self) -> &EventRegistry<EventOf<A>> {
        &self.registry
    }

    /// Loads the aggregate by replaying its stored events.
    ///
    /// An id without events yields an aggregate in the nonexistent state;
    /// callers decide whether that is an error.
    ///
    /// # Errors
    ///
    /// Propagates store errors, and `UnknownEventTag` / `Serialization` if a
    /// record cannot be decoded.
    pub async fn find(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let records = self.store.find(aggregate_id).await?;
        let events = records
            .iter()
            .map(|record| self.registry.from_record(record))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(%aggregate_id, events = events.len(), "replaying aggregate");
        Ok(A::from(Aggregate::from_history(aggregate_id.clone(), events)))
    }

    /// Persists the aggregate's uncommitted events, conditioned on the
    /// version it was loaded at.
    ///
    /// On success the aggregate is marked committed. On failure the
    /// aggregate is left exactly as it was and the error is returned
    /// unchanged, including `ConcurrencyConflict`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEventShape` / `Serialization` if an event cannot be
    /// encoded, or whatever the store reports.
    pub async fn save(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let root = aggregate.root();
        if root.uncommitted_events().is_empty() {
            return Ok(());
        }

        let aggregate_id = root.id().clone();
        let expected_version = root.version();
        let records = root
            .uncommitted_events()
            .iter()
            .map(|event| self.registry.to_record(&aggregate_id, event))
            .collect::<Result<Vec<EventRecord>, _>>()?;

        match self
            .store
            .update(&aggregate_id, expected_version, &records)
            .await
        {
            Ok(()) => {
                info!(
                    %aggregate_id,
                    expected_version,
                    appended = records.len(),
                    "aggregate saved"
                );
                aggregate.root_mut().mark_committed();
                Ok(())
            }
            Err(err) => {
                if matches!(err, DomainError::ConcurrencyConflict { .. }) {
                    warn!(%aggregate_id, expected_version, error = %err, "stale aggregate rejected");
                }
                Err(err)
            }
        }
    }
}
