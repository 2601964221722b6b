//! Event store wire protocol.
//!
//! These routes expose the three store operations so a remote
//! `HttpEventStore` can use this server as its backend.

use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get, routing::post};
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::{EventBatch, EventStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Page size used when a scan request omits `size`.
pub const DEFAULT_SCAN_SIZE: usize = 100;

/// Query string of `GET /api/v1/types/{tag}`.
#[derive(Debug, Default, Deserialize)]
pub struct ScanParams {
    /// Exclusive lower bound on timestamps; `0` reads from the start.
    #[serde(default)]
    pub since: i64,
    /// Maximum records to return.
    pub size: Option<usize>,
}

/// Response body of a successful append.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    /// Stored version after the append.
    pub version: i64,
}

/// GET /api/v1/events/{id}
#[instrument(skip(state))]
async fn find_events(
    State(state): State<AppState>,
    Path(aggregate_id): Path<String>,
) -> Result<Json<EventBatch>, ApiError> {
    let aggregate_id = AggregateId::from(aggregate_id);
    let events = state.store.find(&aggregate_id).await?;
    debug!(events = events.len(), "find served");
    Ok(Json(EventBatch::new(events)))
}

/// POST /api/v1/events/{id}/{expected_version}
#[instrument(skip(state, events), fields(events = events.len()))]
async fn append_events(
    State(state): State<AppState>,
    Path((aggregate_id, expected_version)): Path<(String, i64)>,
    Json(events): Json<Vec<EventRecord>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let aggregate_id = AggregateId::from(aggregate_id);
    state
        .store
        .update(&aggregate_id, expected_version, &events)
        .await?;
    #[allow(clippy::cast_possible_wrap)]
    let version = expected_version + events.len() as i64;
    Ok(Json(UpdateResponse { version }))
}

/// GET /api/v1/types/{tag}?since=&size=
#[instrument(skip(state))]
async fn scan_by_type(
    State(state): State<AppState>,
    Path(type_tag): Path<i32>,
    Query(params): Query<ScanParams>,
) -> Result<Json<EventBatch>, ApiError> {
    let size = params.size.unwrap_or(DEFAULT_SCAN_SIZE);
    let batch = state
        .store
        .get_events_by_type(EventTypeTag(type_tag), params.since, size)
        .await?;
    debug!(returned = batch.events.len(), latest = batch.latest, "scan served");
    Ok(Json(batch))
}

/// Returns the event store router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/events/{aggregate_id}", get(find_events))
        .route(
            "/api/v1/events/{aggregate_id}/{expected_version}",
            post(append_events),
        )
        .route("/api/v1/types/{type_tag}", get(scan_by_type))
}
