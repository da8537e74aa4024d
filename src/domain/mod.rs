//! Domain layer for the Taskforge scheduling core
//!
//! This module contains the core models, the error taxonomy and the
//! ports that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
