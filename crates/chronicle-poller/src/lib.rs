//! Chronicle change-feed poller.
//!
//! Follows one or more event types through an event store's type index,
//! handing each new batch to an [`handler::EventHandler`] and remembering a
//! cursor per type.

pub mod config;
pub mod error;
pub mod handler;
pub mod poller;
