//! Domain layer: entities, invariants, and collaborator contracts.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ErrorKind};
