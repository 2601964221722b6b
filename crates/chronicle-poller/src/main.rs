//! Chronicle change-feed poller entry point.
//!
//! Follows the configured event types on a remote store and logs every new
//! event until interrupted.

use std::sync::Arc;

use chronicle_core::clock::SystemClock;
use chronicle_event_store::http_event_store::HttpEventStore;
use chronicle_poller::config::PollerSettings;
use chronicle_poller::error::AppError;
use chronicle_poller::handler::LoggingEventHandler;
use chronicle_poller::poller::{ChangeFeedPoller, default_start_cursor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let settings = PollerSettings::from_env()?;
    let store = HttpEventStore::new(&settings.store_url)?.with_timeout(settings.store_timeout);
    tracing::info!(
        store_url = %store.base_url(),
        types = ?settings.types,
        "Starting Chronicle poller"
    );

    let poller = ChangeFeedPoller::new(
        Arc::new(store),
        Arc::new(LoggingEventHandler),
        settings.poller,
    );
    let handle = poller.spawn(&settings.types, default_start_cursor(&SystemClock));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    for (type_tag, cursor) in handle.shutdown().await {
        tracing::info!(%type_tag, cursor, "final cursor");
    }
    Ok(())
}
