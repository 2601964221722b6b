//! Chronicle: patient admission bounded context.
//!
//! Patients are admitted to a ward, transferred between wards and finally
//! discharged. Discharge is terminal.

pub mod application;
pub mod domain;
