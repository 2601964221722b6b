//! Aggregate root for the patient admission context.

use chronicle_core::aggregate::{Aggregate, AggregateRoot, AggregateState, Lifecycle};
use chronicle_core::error::DomainError;
use chronicle_core::event::AggregateId;

use crate::domain::events::{
    PatientAdmitted, PatientDischarged, PatientEvent, PatientTransferred,
};

/// State rebuilt from a patient's events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientState {
    /// The patient's name.
    pub name: String,
    /// The ward the patient currently occupies.
    pub ward: String,
    /// The patient's age in years.
    pub age: u32,
    /// Whether the patient has been discharged.
    pub discharged: bool,
}

impl AggregateState for PatientState {
    type Event = PatientEvent;

    fn apply(mut self, event: &PatientEvent) -> Self {
        match event {
            PatientEvent::Admitted(e) => {
                self.name.clone_from(&e.name);
                self.ward.clone_from(&e.ward);
                self.age = e.age;
            }
            PatientEvent::Transferred(e) => self.ward.clone_from(&e.new_ward),
            PatientEvent::Discharged(_) => self.discharged = true,
        }
        self
    }

    fn is_terminal(&self) -> bool {
        self.discharged
    }
}

/// The aggregate root for a patient.
#[derive(Debug, Clone)]
pub struct Patient(Aggregate<PatientState>);

impl From<Aggregate<PatientState>> for Patient {
    fn from(aggregate: Aggregate<PatientState>) -> Self {
        Self(aggregate)
    }
}

impl AggregateRoot for Patient {
    type State = PatientState;

    fn root(&self) -> &Aggregate<PatientState> {
        &self.0
    }

    fn root_mut(&mut self) -> &mut Aggregate<PatientState> {
        &mut self.0
    }
}

impl Patient {
    /// Admits a new patient, raising `PatientAdmitted`.
    ///
    /// # Errors
    ///
    /// Never fails for a fresh aggregate; the signature mirrors the other
    /// operations.
    pub fn admit(
        id: AggregateId,
        name: String,
        age: u32,
        ward: String,
    ) -> Result<Self, DomainError> {
        let mut aggregate = Aggregate::new(id.clone());
        aggregate.raise(PatientEvent::Admitted(PatientAdmitted {
            id,
            name,
            ward,
            age,
        }))?;
        Ok(Self(aggregate))
    }

    /// Moves the patient to `new_ward`, raising `PatientTransferred`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the patient was never
    /// admitted and `DomainError::AlreadyTerminal` once discharged.
    pub fn transfer(&mut self, new_ward: String) -> Result<(), DomainError> {
        self.ensure_admitted()?;
        let id = self.0.id().clone();
        self.0
            .raise(PatientEvent::Transferred(PatientTransferred { id, new_ward }))
    }

    /// Discharges the patient, raising `PatientDischarged`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the patient was never
    /// admitted and `DomainError::AlreadyTerminal` once discharged.
    pub fn discharge(&mut self) -> Result<(), DomainError> {
        self.ensure_admitted()?;
        let id = self.0.id().clone();
        self.0.raise(PatientEvent::Discharged(PatientDischarged { id }))
    }

    fn ensure_admitted(&self) -> Result<(), DomainError> {
        if self.0.lifecycle() == Lifecycle::Nonexistent {
            return Err(DomainError::AggregateNotFound(self.0.id().clone()));
        }
        Ok(())
    }

    /// Returns the patient identifier.
    #[must_use]
    pub fn id(&self) -> &AggregateId {
        self.0.id()
    }

    /// Returns the patient's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.state().name
    }

    /// Returns the current ward.
    #[must_use]
    pub fn ward(&self) -> &str {
        &self.0.state().ward
    }

    /// Returns the patient's age.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.0.state().age
    }

    /// Returns `true` once the patient has been discharged.
    #[must_use]
    pub fn is_discharged(&self) -> bool {
        self.0.state().discharged
    }

    /// Returns the persisted version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.0.version()
    }

    /// Returns the lifecycle stage.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.0.lifecycle()
    }

    /// Returns events raised since the last save.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[PatientEvent] {
        self.0.uncommitted_events()
    }
}
