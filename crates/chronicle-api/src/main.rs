//! Chronicle API server entry point.

use std::sync::Arc;

use chronicle_api::config::{ApiConfig, StoreBackend};
use chronicle_api::error::AppError;
use chronicle_api::state::AppState;
use chronicle_core::store::EventStore;
use chronicle_event_store::memory_store::InMemoryEventStore;
use chronicle_event_store::pg_event_store::PgEventStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

async fn connect_store(backend: &StoreBackend) -> Result<Arc<dyn EventStore>, AppError> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory event store; events are lost on restart");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        StoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            let store = PgEventStore::new(pool);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Chronicle API server");

    let config = ApiConfig::from_env()?;
    let addr = config.socket_addr()?;

    let store = connect_store(&config.backend).await?;
    let app = chronicle_api::build_router(AppState::new(store)?);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
