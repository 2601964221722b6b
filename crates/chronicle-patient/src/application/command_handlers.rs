//! Command handlers for the patient admission context.
//!
//! Each handler validates its command, loads the aggregate through the
//! repository, runs the domain operation and saves. Errors from the domain,
//! the registry and the store are returned as they are.

use chronicle_core::aggregate::Lifecycle;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::repository::AggregateRepository;
use tracing::debug;

use crate::domain::aggregates::Patient;
use crate::domain::commands::{AdmitPatient, DischargePatient, TransferPatient};

fn require_non_empty(value: &str, field: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Loads a patient, failing if it was never admitted.
async fn load_existing(
    command: &dyn Command,
    repo: &AggregateRepository<Patient>,
) -> Result<Patient, DomainError> {
    let patient = repo.find(command.aggregate_id()).await?;
    if patient.lifecycle() == Lifecycle::Nonexistent {
        return Err(DomainError::AggregateNotFound(command.aggregate_id().clone()));
    }
    Ok(patient)
}

/// Handles the `AdmitPatient` command: creates a fresh aggregate and saves
/// the admission at version 0.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty name or ward and
/// `DomainError::ConcurrencyConflict` if the id already has events.
pub async fn handle_admit_patient(
    command: &AdmitPatient,
    repo: &AggregateRepository<Patient>,
) -> Result<Patient, DomainError> {
    require_non_empty(&command.name, "patient name")?;
    require_non_empty(&command.ward, "ward")?;
    debug!(command = command.command_type(), patient_id = %command.patient_id, "handling command");

    let mut patient = Patient::admit(
        command.patient_id.clone(),
        command.name.clone(),
        command.age,
        command.ward.clone(),
    )?;
    repo.save(&mut patient).await?;
    Ok(patient)
}

/// Handles the `TransferPatient` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty ward,
/// `DomainError::AggregateNotFound` for an unknown patient,
/// `DomainError::AlreadyTerminal` after discharge, or whatever the store
/// reports.
pub async fn handle_transfer_patient(
    command: &TransferPatient,
    repo: &AggregateRepository<Patient>,
) -> Result<Patient, DomainError> {
    require_non_empty(&command.new_ward, "ward")?;
    debug!(command = command.command_type(), patient_id = %command.patient_id, "handling command");

    let mut patient = load_existing(command, repo).await?;
    patient.transfer(command.new_ward.clone())?;
    repo.save(&mut patient).await?;
    Ok(patient)
}

/// Handles the `DischargePatient` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown patient,
/// `DomainError::AlreadyTerminal` if already discharged, or whatever the
/// store reports.
pub async fn handle_discharge_patient(
    command: &DischargePatient,
    repo: &AggregateRepository<Patient>,
) -> Result<Patient, DomainError> {
    debug!(command = command.command_type(), patient_id = %command.patient_id, "handling command");

    let mut patient = load_existing(command, repo).await?;
    patient.discharge()?;
    repo.save(&mut patient).await?;
    Ok(patient)
}
