//! Infrastructure adapters for external systems.

pub mod oracles;
