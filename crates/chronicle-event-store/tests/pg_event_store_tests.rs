//! Integration tests for `PgEventStore`. These need a running `PostgreSQL`
//! reachable through `DATABASE_URL`; run them with `cargo test -- --ignored`.

use std::sync::Arc;

use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::EventStore;
use chronicle_event_store::pg_event_store::PgEventStore;
use chronicle_test_support::SteppingClock;
use sqlx::PgPool;

const ADMITTED: EventTypeTag = EventTypeTag(1);
const TRANSFERRED: EventTypeTag = EventTypeTag(2);

fn record(id: &str, tag: EventTypeTag) -> EventRecord {
    EventRecord::new(id, tag, serde_json::json!({ "id": id }))
}

fn store(pool: PgPool) -> PgEventStore {
    PgEventStore::new(pool).with_clock(Arc::new(SteppingClock::new(1_000, 10)))
}

// --- find ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_find_returns_empty_vec_for_unknown_aggregate(pool: PgPool) {
    let store = store(pool);

    let events = store.find(&AggregateId::from("missing")).await.unwrap();

    assert!(events.is_empty());
}

// --- update ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_then_find_returns_records_in_append_order(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let id = AggregateId::from("p-1");

    // Act
    store
        .update(&id, 0, &[record("p-1", ADMITTED), record("p-1", TRANSFERRED)])
        .await
        .unwrap();
    store.update(&id, 2, &[record("p-1", TRANSFERRED)]).await.unwrap();

    // Assert
    let events = store.find(&id).await.unwrap();
    assert_eq!(
        events.iter().map(|e| e.type_tag).collect::<Vec<_>>(),
        vec![ADMITTED, TRANSFERRED, TRANSFERRED]
    );
    assert!(events.iter().all(EventRecord::has_timestamp));
    assert_eq!(events[0].payload, serde_json::json!({ "id": "p-1" }));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_with_stale_version_returns_conflict_and_writes_nothing(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let id = AggregateId::from("p-1");
    store.update(&id, 0, &[record("p-1", ADMITTED)]).await.unwrap();

    // Act
    let result = store.update(&id, 0, &[record("p-1", TRANSFERRED)]).await;

    // Assert
    assert_eq!(
        result.unwrap_err(),
        DomainError::ConcurrencyConflict {
            aggregate_id: id.clone(),
            expected: 0,
            actual: 1,
        }
    );
    assert_eq!(store.find(&id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_ahead_of_stored_version_returns_conflict(pool: PgPool) {
    let store = store(pool);
    let id = AggregateId::from("p-1");

    let result = store.update(&id, 3, &[record("p-1", ADMITTED)]).await;

    assert!(matches!(
        result,
        Err(DomainError::ConcurrencyConflict { expected: 3, actual: 0, .. })
    ));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_writers_at_same_version_have_exactly_one_winner(pool: PgPool) {
    // Arrange
    let store = Arc::new(store(pool));
    let id = AggregateId::from("p-1");
    store.update(&id, 0, &[record("p-1", ADMITTED)]).await.unwrap();

    // Act
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            store.update(&id, 1, &[record("p-1", TRANSFERRED)]).await
        }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            winners += 1;
        }
    }

    // Assert
    assert_eq!(winners, 1);
    assert_eq!(store.find(&id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_batches_with_opposite_tag_order_both_commit(pool: PgPool) {
    // Arrange
    let store = Arc::new(store(pool));

    for round in 0..20 {
        let forward_id = AggregateId::from(format!("f-{round}"));
        let backward_id = AggregateId::from(format!("b-{round}"));
        let forward = [
            record(forward_id.as_str(), ADMITTED),
            record(forward_id.as_str(), TRANSFERRED),
        ];
        let backward = [
            record(backward_id.as_str(), TRANSFERRED),
            record(backward_id.as_str(), ADMITTED),
        ];

        // Act
        let (first, second) = tokio::join!(
            store.update(&forward_id, 0, &forward),
            store.update(&backward_id, 0, &backward),
        );

        // Assert
        first.unwrap();
        second.unwrap();
    }
    for tag in [ADMITTED, TRANSFERRED] {
        let batch = store.get_events_by_type(tag, 0, 100).await.unwrap();
        assert_eq!(batch.events.len(), 40);
        assert!(batch.events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_caller_timestamp_beyond_range_is_rejected(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let id = AggregateId::from("p-1");

    // Act
    let result = store
        .update(&id, 0, &[record("p-1", ADMITTED).with_timestamp(i64::MAX)])
        .await;

    // Assert
    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(store.find(&id).await.unwrap().is_empty());
}

// --- get_events_by_type ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_scan_by_type_pages_with_strict_cursor(pool: PgPool) {
    // Arrange
    let store = store(pool);
    for n in 0..5 {
        let id = format!("p-{n}");
        store
            .update(&AggregateId::from(id.as_str()), 0, &[record(&id, ADMITTED)])
            .await
            .unwrap();
    }
    store
        .update(&AggregateId::from("p-0"), 1, &[record("p-0", TRANSFERRED)])
        .await
        .unwrap();

    // Act
    let first = store.get_events_by_type(ADMITTED, 0, 3).await.unwrap();
    let second = store
        .get_events_by_type(ADMITTED, first.latest, 3)
        .await
        .unwrap();
    let third = store
        .get_events_by_type(ADMITTED, second.latest, 3)
        .await
        .unwrap();

    // Assert
    assert_eq!(first.events.len(), 3);
    assert_eq!(second.events.len(), 2);
    assert!(third.is_empty());
    assert_eq!(third.latest, 0);
    assert!(first.latest < second.events[0].timestamp);
    assert!(first.events.iter().all(|e| e.type_tag == ADMITTED));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_ensure_schema_is_idempotent(pool: PgPool) {
    let store = store(pool);

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();
}
