//! Domain events for the patient admission context.

use chronicle_core::error::DomainError;
use chronicle_core::event::{AggregateId, DomainEvent, EventTypeTag};
use chronicle_core::registry::EventRegistry;
use serde::{Deserialize, Serialize};

/// Event type name of [`PatientAdmitted`].
pub const PATIENT_ADMITTED_EVENT_TYPE: &str = "patient.admitted";
/// Event type name of [`PatientTransferred`].
pub const PATIENT_TRANSFERRED_EVENT_TYPE: &str = "patient.transferred";
/// Event type name of [`PatientDischarged`].
pub const PATIENT_DISCHARGED_EVENT_TYPE: &str = "patient.discharged";

/// Stored tag of [`PatientAdmitted`].
pub const PATIENT_ADMITTED: EventTypeTag = EventTypeTag(1);
/// Stored tag of [`PatientTransferred`].
pub const PATIENT_TRANSFERRED: EventTypeTag = EventTypeTag(2);
/// Stored tag of [`PatientDischarged`].
pub const PATIENT_DISCHARGED: EventTypeTag = EventTypeTag(3);

/// Emitted when a patient is admitted to a ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientAdmitted {
    /// The patient identifier.
    pub id: AggregateId,
    /// The patient's name.
    pub name: String,
    /// The ward the patient is admitted to.
    pub ward: String,
    /// The patient's age in years.
    pub age: u32,
}

/// Emitted when a patient moves to another ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientTransferred {
    /// The patient identifier.
    pub id: AggregateId,
    /// The destination ward.
    pub new_ward: String,
}

/// Emitted when a patient is discharged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDischarged {
    /// The patient identifier.
    pub id: AggregateId,
}

/// Event vocabulary of the patient aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientEvent {
    /// A patient has been admitted.
    Admitted(PatientAdmitted),
    /// A patient has been transferred.
    Transferred(PatientTransferred),
    /// A patient has been discharged.
    Discharged(PatientDischarged),
}

impl DomainEvent for PatientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Admitted(_) => PATIENT_ADMITTED_EVENT_TYPE,
            Self::Transferred(_) => PATIENT_TRANSFERRED_EVENT_TYPE,
            Self::Discharged(_) => PATIENT_DISCHARGED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        let payload = match self {
            Self::Admitted(e) => serde_json::to_value(e)?,
            Self::Transferred(e) => serde_json::to_value(e)?,
            Self::Discharged(e) => serde_json::to_value(e)?,
        };
        Ok(payload)
    }

    fn from_payload(event_type: &str, payload: serde_json::Value) -> Result<Self, DomainError> {
        match event_type {
            PATIENT_ADMITTED_EVENT_TYPE => Ok(Self::Admitted(serde_json::from_value(payload)?)),
            PATIENT_TRANSFERRED_EVENT_TYPE => {
                Ok(Self::Transferred(serde_json::from_value(payload)?))
            }
            PATIENT_DISCHARGED_EVENT_TYPE => Ok(Self::Discharged(serde_json::from_value(payload)?)),
            other => Err(DomainError::UnknownEventShape(other.to_owned())),
        }
    }
}

/// Builds the tag table for [`PatientEvent`].
///
/// # Errors
///
/// Returns `DomainError::InvalidRegistry` if the table is not one-to-one.
pub fn patient_registry() -> Result<EventRegistry<PatientEvent>, DomainError> {
    EventRegistry::new(&[
        (PATIENT_ADMITTED, PATIENT_ADMITTED_EVENT_TYPE),
        (PATIENT_TRANSFERRED, PATIENT_TRANSFERRED_EVENT_TYPE),
        (PATIENT_DISCHARGED, PATIENT_DISCHARGED_EVENT_TYPE),
    ])
}
