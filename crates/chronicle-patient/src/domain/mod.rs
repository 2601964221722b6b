//! Domain layer: events, aggregate and commands.

pub mod aggregates;
pub mod commands;
pub mod events;
