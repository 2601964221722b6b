//! `PostgreSQL` implementation of the `EventStore` trait.
//!
//! An append runs in one transaction: the version row is advanced with a
//! conditional insert/update (the compare-and-set), timestamps are assigned
//! under per-tag advisory locks taken in tag order, and the records are
//! inserted. If the conditional write touches no row the transaction is
//! rolled back and the caller gets `ConcurrencyConflict`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use chronicle_core::clock::{Clock, SystemClock};
use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::{
    EventBatch, EventStore, effective_batch_size, next_timestamp, validate_append,
};

use crate::schema::CREATE_EVENTS_TABLES;
use crate::timeout::{DEFAULT_STORE_TIMEOUT, bounded};

type EventRow = (String, i32, serde_json::Value, i64);

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("postgres: {err}"))
}

fn to_record((aggregate_id, type_tag, payload, saved_at): EventRow) -> EventRecord {
    EventRecord {
        aggregate_id: AggregateId::from(aggregate_id),
        type_tag: EventTypeTag(type_tag),
        payload,
        timestamp: saved_at,
    }
}

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl std::fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PgEventStore {
    /// Creates a new `PgEventStore` using the system clock and the default
    /// per-call timeout.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Replaces the clock used to stamp events.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates the tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_EVENTS_TABLES)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: &AggregateId,
    ) -> Result<i64, DomainError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM aggregate_versions WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(infrastructure)?;
        Ok(version.unwrap_or(0))
    }

    /// Advances the version row from `expected_version` to `new_version`.
    /// Returns `false` if another writer got there first.
    async fn compare_and_set_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: &AggregateId,
        expected_version: i64,
        new_version: i64,
    ) -> Result<bool, DomainError> {
        let result = if expected_version == 0 {
            sqlx::query(
                "INSERT INTO aggregate_versions (aggregate_id, version) VALUES ($1, $2) \
                 ON CONFLICT (aggregate_id) DO NOTHING",
            )
            .bind(aggregate_id.as_str())
            .bind(new_version)
            .execute(&mut **tx)
            .await
        } else {
            sqlx::query(
                "UPDATE aggregate_versions SET version = $1 \
                 WHERE aggregate_id = $2 AND version = $3",
            )
            .bind(new_version)
            .bind(aggregate_id.as_str())
            .bind(expected_version)
            .execute(&mut **tx)
            .await
        };
        Ok(result.map_err(infrastructure)?.rows_affected() == 1)
    }

    /// Locks every tag in `events` that needs a store-assigned timestamp and
    /// reads its current latest timestamp.
    ///
    /// Locks must be taken in ascending tag order; batches listing the same
    /// tags in different orders would otherwise deadlock.
    async fn lock_stamped_tags(
        tx: &mut Transaction<'_, Postgres>,
        events: &[EventRecord],
    ) -> Result<BTreeMap<EventTypeTag, i64>, DomainError> {
        let tags: BTreeSet<EventTypeTag> = events
            .iter()
            .filter(|e| !e.has_timestamp())
            .map(|e| e.type_tag)
            .collect();
        let mut latest_by_tag = BTreeMap::new();
        for type_tag in tags {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(i64::from(type_tag.0))
                .execute(&mut **tx)
                .await
                .map_err(infrastructure)?;
            let latest: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(saved_at), 0) FROM events WHERE type_tag = $1",
            )
            .bind(type_tag.0)
            .fetch_one(&mut **tx)
            .await
            .map_err(infrastructure)?;
            latest_by_tag.insert(type_tag, latest);
        }
        Ok(latest_by_tag)
    }

    async fn append(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        #[allow(clippy::cast_possible_wrap)]
        let new_version = expected_version + events.len() as i64;
        let applied = if events.is_empty() {
            Self::current_version(&mut tx, aggregate_id).await? == expected_version
        } else {
            Self::compare_and_set_version(&mut tx, aggregate_id, expected_version, new_version)
                .await?
        };

        if !applied {
            let actual = Self::current_version(&mut tx, aggregate_id).await?;
            tx.rollback().await.map_err(infrastructure)?;
            warn!(%aggregate_id, expected_version, actual, "optimistic concurrency conflict");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let mut latest_by_tag = Self::lock_stamped_tags(&mut tx, events).await?;
        let now = self.clock.now_millis();
        let mut version = expected_version;
        for record in events {
            version += 1;
            let latest = latest_by_tag.entry(record.type_tag).or_default();
            let timestamp = if record.has_timestamp() {
                record.timestamp
            } else {
                next_timestamp(now, *latest)?
            };
            *latest = (*latest).max(timestamp);
            sqlx::query(
                "INSERT INTO events (aggregate_id, version, type_tag, payload, saved_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(aggregate_id.as_str())
            .bind(version)
            .bind(record.type_tag.0)
            .bind(&record.payload)
            .bind(timestamp)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;
        }

        tx.commit().await.map_err(infrastructure)?;
        info!(%aggregate_id, expected_version, appended = events.len(), "events appended");
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        bounded(self.timeout, "find", async {
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT aggregate_id, type_tag, payload, saved_at FROM events \
                 WHERE aggregate_id = $1 ORDER BY version",
            )
            .bind(aggregate_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;
            debug!(%aggregate_id, events = rows.len(), "find");
            Ok(rows.into_iter().map(to_record).collect())
        })
        .await
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        validate_append(aggregate_id, events)?;
        bounded(
            self.timeout,
            "update",
            self.append(aggregate_id, expected_version, events),
        )
        .await
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        let limit = i64::try_from(effective_batch_size(batch_size)).unwrap_or(i64::MAX);
        bounded(self.timeout, "get_events_by_type", async {
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT aggregate_id, type_tag, payload, saved_at FROM events \
                 WHERE type_tag = $1 AND ($2 = 0 OR saved_at > $2) \
                 ORDER BY saved_at, aggregate_id, version LIMIT $3",
            )
            .bind(type_tag.0)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;
            debug!(%type_tag, since, returned = rows.len(), "scan by type");
            Ok(EventBatch::new(rows.into_iter().map(to_record).collect()))
        })
        .await
    }
}
