//! Oracle that is never reachable.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ComplexityOracle;

/// Always reports [`DomainError::OracleUnavailable`], which sends the
/// analyzer and decomposer down their deterministic fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl OfflineOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComplexityOracle for OfflineOracle {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, _prompt: &str) -> DomainResult<String> {
        Err(DomainError::OracleUnavailable(
            "running in offline mode".to_string(),
        ))
    }
}
