//! Integration tests for the patient admission endpoints.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_admit_transfer_discharge_round_trip() {
    let (app, _) = common::build_memory_app();

    // Admit
    let (status, json) = common::post_json(
        app.clone(),
        "/api/v1/patients",
        &serde_json::json!({ "patient_id": "p-1", "name": "Ada", "age": 42, "ward": "AA" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 1);

    // Transfer
    let (status, json) = common::post_json(
        app.clone(),
        "/api/v1/patients/p-1/transfer",
        &serde_json::json!({ "new_ward": "BB" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);
    assert_eq!(json["ward"], "BB");

    // Discharge
    let (status, json) = common::post_json(
        app.clone(),
        "/api/v1/patients/p-1/discharge",
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 3);
    assert_eq!(json["discharged"], true);

    // Second discharge is rejected by the domain, not the store
    let (status, json) = common::post_json(
        app.clone(),
        "/api/v1/patients/p-1/discharge",
        &serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "already_terminal");

    // Persisted state
    let (status, json) = common::get_json(app, "/api/v1/patients/p-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Ada");
    assert_eq!(json["ward"], "BB");
    assert_eq!(json["version"], 3);
}

#[tokio::test]
async fn test_admitting_the_same_id_twice_returns_409_conflict() {
    let (app, _) = common::build_memory_app();
    let body = serde_json::json!({ "patient_id": "p-1", "name": "Ada", "age": 42, "ward": "AA" });
    common::post_json(app.clone(), "/api/v1/patients", &body).await;

    let (status, json) = common::post_json(app, "/api/v1/patients", &body).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "concurrency_conflict");
    assert_eq!(json["current_version"], 1);
}

#[tokio::test]
async fn test_census_counts_current_patients() {
    // Arrange
    let (app, _) = common::build_memory_app();
    for id in ["p-1", "p-2", "p-3"] {
        common::post_json(
            app.clone(),
            "/api/v1/patients",
            &serde_json::json!({ "patient_id": id, "name": "Ada", "age": 42, "ward": "AA" }),
        )
        .await;
    }
    common::post_json(
        app.clone(),
        "/api/v1/patients/p-2/discharge",
        &serde_json::json!({}),
    )
    .await;

    // Act
    let (status, json) = common::get_json(app, "/api/v1/patients/census").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["admitted"], 3);
    assert_eq!(json["discharged"], 1);
    assert_eq!(json["current"], 2);
}

#[tokio::test]
async fn test_get_unknown_patient_returns_404() {
    let (app, _) = common::build_memory_app();

    let (status, json) = common::get_json(app, "/api/v1/patients/ghost").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");
}
