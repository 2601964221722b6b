//! Chronicle event store backends.
//!
//! Every backend implements `chronicle_core::store::EventStore` with the
//! same semantics: atomic compare-and-append on the aggregate version,
//! ordered `find`, and resumable type-indexed scans.

pub mod http_event_store;
pub mod memory_store;
pub mod pg_event_store;
pub mod schema;

mod timeout;

pub use timeout::DEFAULT_STORE_TIMEOUT;
