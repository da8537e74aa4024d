//! CLI command implementations.

pub mod analyze;
pub mod plan;

use std::sync::Arc;

use crate::adapters::oracles::{CommandOracle, OfflineOracle};
use crate::domain::models::Config;
use crate::domain::ports::ComplexityOracle;

/// Oracle selected by the `--offline` flag.
pub fn build_oracle(config: &Config, offline: bool) -> Arc<dyn ComplexityOracle> {
    if offline {
        Arc::new(OfflineOracle::new())
    } else {
        Arc::new(CommandOracle::new(&config.oracle))
    }
}
