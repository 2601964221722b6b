//! Chronicle core: event-sourcing abstractions.
//!
//! This crate defines the aggregate model, the event type registry, the
//! event store contract and the repository that ties them together. It
//! contains no storage backends; those live in `chronicle-event-store`.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod registry;
pub mod repository;
pub mod store;
