//! Shared application state.

use std::sync::Arc;

use chronicle_core::error::DomainError;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use chronicle_patient::domain::aggregates::Patient;
use chronicle_patient::domain::events::patient_registry;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The event store behind every route.
    pub store: Arc<dyn EventStore>,
    /// Repository for patient aggregates over `store`.
    pub patients: AggregateRepository<Patient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("patients", &self.patients)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state over `store`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRegistry` if the patient event table is
    /// not one-to-one.
    pub fn new(store: Arc<dyn EventStore>) -> Result<Self, DomainError> {
        let patients = AggregateRepository::new(Arc::clone(&store), Arc::new(patient_registry()?));
        Ok(Self { store, patients })
    }
}
