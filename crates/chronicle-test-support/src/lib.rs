//! Shared test mocks and utilities for Chronicle.

mod clock;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use store::{
    ConflictingEventStore, EmptyEventStore, FailingEventStore, FlakyEventStore,
    RecordingEventStore,
};
