//! Remote `EventStore` client speaking the store's JSON-over-HTTP protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventRecord, EventTypeTag};
use chronicle_core::store::{EventBatch, EventStore, effective_batch_size};

use crate::timeout::{DEFAULT_STORE_TIMEOUT, bounded};

/// Error body returned by the store server for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(default)]
    current_version: Option<i64>,
}

fn transport(err: &reqwest::Error) -> DomainError {
    if err.is_timeout() {
        DomainError::Timeout(format!("event store request timed out: {err}"))
    } else {
        DomainError::Infrastructure(format!("event store request failed: {err}"))
    }
}

/// Event store backed by a remote store server.
#[derive(Debug, Clone)]
pub struct HttpEventStore {
    base_url: Url,
    client: Client,
    timeout: Duration,
}

impl HttpEventStore {
    /// Creates a client for the store server at `base_url` with the default
    /// per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, DomainError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DomainError::Validation(format!("invalid store url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DomainError::Validation(format!(
                "invalid store url {base_url}: not a base url"
            )));
        }
        Ok(Self {
            base_url,
            client: Client::new(),
            timeout: DEFAULT_STORE_TIMEOUT,
        })
    }

    /// Replaces the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DomainError::Validation(format!("invalid store url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    /// Maps a non-success response to the matching `DomainError`.
    async fn error_for(
        response: Response,
        aggregate_id: Option<(&AggregateId, i64)>,
    ) -> DomainError {
        let status = response.status();
        let body = response.json::<ErrorBody>().await.ok();
        let message = body
            .as_ref()
            .map_or_else(|| status.to_string(), |b| b.message.clone());

        match (status, body, aggregate_id) {
            (StatusCode::CONFLICT, Some(body), Some((aggregate_id, expected)))
                if body.error == "concurrency_conflict" =>
            {
                DomainError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected,
                    actual: body.current_version.unwrap_or(expected),
                }
            }
            (StatusCode::GATEWAY_TIMEOUT, _, _) => DomainError::Timeout(message),
            (StatusCode::BAD_REQUEST, _, _) => DomainError::Validation(message),
            _ => DomainError::Infrastructure(format!("event store returned {status}: {message}")),
        }
    }

    async fn fetch_batch(&self, url: Url) -> Result<EventBatch, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, None).await);
        }
        response
            .json::<EventBatch>()
            .await
            .map_err(|e| DomainError::Serialization(format!("invalid event batch: {e}")))
    }
}

#[async_trait]
impl EventStore for HttpEventStore {
    async fn find(&self, aggregate_id: &AggregateId) -> Result<Vec<EventRecord>, DomainError> {
        let url = self.endpoint(&["events", aggregate_id.as_str()])?;
        let batch = bounded(self.timeout, "find", self.fetch_batch(url)).await?;
        debug!(%aggregate_id, events = batch.events.len(), "remote find");
        Ok(batch.events)
    }

    async fn update(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        let version = expected_version.to_string();
        let url = self.endpoint(&["events", aggregate_id.as_str(), &version])?;
        bounded(self.timeout, "update", async {
            let response = self
                .client
                .post(url)
                .json(events)
                .send()
                .await
                .map_err(|e| transport(&e))?;
            if response.status().is_success() {
                debug!(%aggregate_id, expected_version, appended = events.len(), "remote update");
                return Ok(());
            }
            let err = Self::error_for(response, Some((aggregate_id, expected_version))).await;
            if matches!(err, DomainError::ConcurrencyConflict { .. }) {
                warn!(%aggregate_id, expected_version, error = %err, "remote update rejected");
            }
            Err(err)
        })
        .await
    }

    async fn get_events_by_type(
        &self,
        type_tag: EventTypeTag,
        since: i64,
        batch_size: usize,
    ) -> Result<EventBatch, DomainError> {
        let tag = type_tag.to_string();
        let mut url = self.endpoint(&["types", &tag])?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_string())
            .append_pair("size", &effective_batch_size(batch_size).to_string());
        bounded(self.timeout, "get_events_by_type", self.fetch_batch(url)).await
    }
}
