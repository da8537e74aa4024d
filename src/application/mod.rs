//! Application layer wiring the services into one submission flow.

pub mod work_coordinator;

pub use work_coordinator::{Submission, WorkCoordinator};
