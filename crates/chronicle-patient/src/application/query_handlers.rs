//! Query handlers for the patient admission context.
//!
//! `get_patient` replays one aggregate into a read-only view. `census` walks
//! the type index and never touches individual aggregates.

use chronicle_core::aggregate::Lifecycle;
use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, EventTypeTag};
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use serde::Serialize;
use tracing::debug;

use crate::domain::aggregates::Patient;
use crate::domain::events::{PATIENT_ADMITTED, PATIENT_DISCHARGED};

/// Page size used while counting events for the census.
const CENSUS_PAGE_SIZE: usize = 500;

/// Read-only view of a patient aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientView {
    /// The patient identifier.
    pub patient_id: AggregateId,
    /// The patient's name.
    pub name: String,
    /// The patient's age in years.
    pub age: u32,
    /// The current ward.
    pub ward: String,
    /// Whether the patient has been discharged.
    pub discharged: bool,
    /// Current version (event count).
    pub version: i64,
}

impl From<&Patient> for PatientView {
    fn from(patient: &Patient) -> Self {
        Self {
            patient_id: patient.id().clone(),
            name: patient.name().to_owned(),
            age: patient.age(),
            ward: patient.ward().to_owned(),
            discharged: patient.is_discharged(),
            version: patient.version(),
        }
    }
}

/// Admission counts derived from the type index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    /// Admissions recorded after the cursor.
    pub admitted: u64,
    /// Discharges recorded after the cursor.
    pub discharged: u64,
    /// Admitted minus discharged, floored at zero.
    pub current: u64,
}

/// Retrieves a patient by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the id,
/// or whatever the repository reports.
pub async fn get_patient(
    patient_id: &AggregateId,
    repo: &AggregateRepository<Patient>,
) -> Result<PatientView, DomainError> {
    let patient = repo.find(patient_id).await?;
    if patient.lifecycle() == Lifecycle::Nonexistent {
        return Err(DomainError::AggregateNotFound(patient_id.clone()));
    }
    Ok(PatientView::from(&patient))
}

async fn count_since(
    store: &dyn EventStore,
    type_tag: EventTypeTag,
    since: i64,
) -> Result<u64, DomainError> {
    let mut cursor = since;
    let mut count = 0u64;
    loop {
        let batch = store
            .get_events_by_type(type_tag, cursor, CENSUS_PAGE_SIZE)
            .await?;
        if batch.is_empty() {
            break;
        }
        count += batch.events.len() as u64;
        if batch.latest <= cursor {
            break;
        }
        cursor = batch.latest;
    }
    debug!(%type_tag, since, count, "counted events");
    Ok(count)
}

/// Counts admissions and discharges recorded after `since` (all when
/// `since` is `0`).
///
/// # Errors
///
/// Returns whatever the store reports.
pub async fn census(store: &dyn EventStore, since: i64) -> Result<Census, DomainError> {
    let admitted = count_since(store, PATIENT_ADMITTED, since).await?;
    let discharged = count_since(store, PATIENT_DISCHARGED, since).await?;
    Ok(Census {
        admitted,
        discharged,
        current: admitted.saturating_sub(discharged),
    })
}
