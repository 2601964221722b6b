//! Routes for the patient admission context.

use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get, routing::post};
use chronicle_core::event::AggregateId;
use chronicle_patient::application::command_handlers;
use chronicle_patient::application::query_handlers::{self, Census, PatientView};
use chronicle_patient::domain::commands;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /api/v1/patients.
#[derive(Debug, Deserialize)]
pub struct AdmitPatientRequest {
    /// Caller-chosen id; a fresh UUID is used when omitted.
    pub patient_id: Option<String>,
    /// The patient's name.
    pub name: String,
    /// The patient's age in years.
    pub age: u32,
    /// The admitting ward.
    pub ward: String,
}

/// Request body for POST /api/v1/patients/{id}/transfer.
#[derive(Debug, Deserialize)]
pub struct TransferPatientRequest {
    /// The destination ward.
    pub new_ward: String,
}

/// Query string of GET /api/v1/patients/census.
#[derive(Debug, Default, Deserialize)]
pub struct CensusParams {
    /// Only count events after this timestamp; `0` counts everything.
    #[serde(default)]
    pub since: i64,
}

/// POST /api/v1/patients
#[instrument(skip(state, request), fields(ward = %request.ward))]
async fn admit_patient(
    State(state): State<AppState>,
    Json(request): Json<AdmitPatientRequest>,
) -> Result<Json<PatientView>, ApiError> {
    let patient_id = request
        .patient_id
        .map_or_else(|| AggregateId::from(Uuid::new_v4()), AggregateId::from);
    let command = commands::AdmitPatient {
        patient_id,
        name: request.name,
        age: request.age,
        ward: request.ward,
    };

    info!(patient_id = %command.patient_id, "handling admit_patient command");

    let patient = command_handlers::handle_admit_patient(&command, &state.patients).await?;
    Ok(Json(PatientView::from(&patient)))
}

/// POST /api/v1/patients/{id}/transfer
#[instrument(skip(state, request))]
async fn transfer_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(request): Json<TransferPatientRequest>,
) -> Result<Json<PatientView>, ApiError> {
    let command = commands::TransferPatient {
        patient_id: AggregateId::from(patient_id),
        new_ward: request.new_ward,
    };

    info!(new_ward = %command.new_ward, "handling transfer_patient command");

    let patient = command_handlers::handle_transfer_patient(&command, &state.patients).await?;
    Ok(Json(PatientView::from(&patient)))
}

/// POST /api/v1/patients/{id}/discharge
#[instrument(skip(state))]
async fn discharge_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientView>, ApiError> {
    let command = commands::DischargePatient {
        patient_id: AggregateId::from(patient_id),
    };

    info!("handling discharge_patient command");

    let patient = command_handlers::handle_discharge_patient(&command, &state.patients).await?;
    Ok(Json(PatientView::from(&patient)))
}

/// GET /api/v1/patients/{id}
async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientView>, ApiError> {
    let view = query_handlers::get_patient(&AggregateId::from(patient_id), &state.patients).await?;
    Ok(Json(view))
}

/// GET /api/v1/patients/census?since=
async fn census(
    State(state): State<AppState>,
    Query(params): Query<CensusParams>,
) -> Result<Json<Census>, ApiError> {
    let census = query_handlers::census(&*state.store, params.since).await?;
    Ok(Json(census))
}

/// Returns the router for the patient context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/patients", post(admit_patient))
        .route("/api/v1/patients/census", get(census))
        .route("/api/v1/patients/{patient_id}", get(get_patient))
        .route(
            "/api/v1/patients/{patient_id}/transfer",
            post(transfer_patient),
        )
        .route(
            "/api/v1/patients/{patient_id}/discharge",
            post(discharge_patient),
        )
}
