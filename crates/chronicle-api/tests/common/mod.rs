//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronicle_core::store::EventStore;
use chronicle_event_store::memory_store::InMemoryEventStore;
use http_body_util::BodyExt;
use tower::ServiceExt;

use chronicle_api::build_router;
use chronicle_api::state::AppState;

/// Build the full app router over `store`, wired the same way as `main.rs`.
pub fn build_test_app(store: Arc<dyn EventStore>) -> Router {
    build_router(AppState::new(store).unwrap())
}

/// Build the full app router over a fresh in-memory store.
pub fn build_memory_app() -> (Router, Arc<InMemoryEventStore>) {
    let store = Arc::new(InMemoryEventStore::new());
    (build_test_app(store.clone()), store)
}

/// Serve `app` on an ephemeral local port and return its address.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
