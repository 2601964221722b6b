//! Consumers of polled batches.

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::{EventRecord, EventTypeTag};
use tracing::info;

/// Receives every non-empty batch a poll loop reads.
///
/// A handler error is treated like a failed read: the cursor stays put and
/// the same batch is offered again after backoff.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles records of `type_tag` in ascending timestamp order.
    async fn handle(
        &self,
        type_tag: EventTypeTag,
        events: &[EventRecord],
    ) -> Result<(), DomainError>;
}

/// Handler that logs each record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(
        &self,
        type_tag: EventTypeTag,
        events: &[EventRecord],
    ) -> Result<(), DomainError> {
        for event in events {
            info!(
                %type_tag,
                aggregate_id = %event.aggregate_id,
                timestamp = event.timestamp,
                payload = %event.payload,
                "event received"
            );
        }
        Ok(())
    }
}
