//! Commands for the patient admission context.

use chronicle_core::command::Command;
use chronicle_core::event::AggregateId;

/// Command to admit a new patient.
#[derive(Debug, Clone)]
pub struct AdmitPatient {
    /// The patient identifier, chosen by the caller.
    pub patient_id: AggregateId,
    /// The patient's name.
    pub name: String,
    /// The patient's age in years.
    pub age: u32,
    /// The admitting ward.
    pub ward: String,
}

/// Command to transfer a patient to another ward.
#[derive(Debug, Clone)]
pub struct TransferPatient {
    /// The patient identifier.
    pub patient_id: AggregateId,
    /// The destination ward.
    pub new_ward: String,
}

/// Command to discharge a patient.
#[derive(Debug, Clone)]
pub struct DischargePatient {
    /// The patient identifier.
    pub patient_id: AggregateId,
}

impl Command for AdmitPatient {
    fn command_type(&self) -> &'static str {
        "patient.admit"
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.patient_id
    }
}

impl Command for TransferPatient {
    fn command_type(&self) -> &'static str {
        "patient.transfer"
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.patient_id
    }
}

impl Command for DischargePatient {
    fn command_type(&self) -> &'static str {
        "patient.discharge"
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.patient_id
    }
}
