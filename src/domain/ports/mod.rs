//! Port trait definitions (Hexagonal Architecture)
//!
//! - ComplexityOracle: the external analyst consulted for complexity
//!   estimates and subtask breakdowns

pub mod complexity_oracle;

pub use complexity_oracle::ComplexityOracle;
