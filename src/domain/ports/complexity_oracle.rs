//! Complexity oracle port - interface for the external task analyst.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// An external collaborator that turns a textual prompt into a reply
/// expected to contain one JSON object.
///
/// Implementations report transport or process failures as
/// [`DomainError::OracleUnavailable`](crate::domain::errors::DomainError::OracleUnavailable).
/// Callers impose their own bounded wait; an oracle is free to hang.
#[async_trait]
pub trait ComplexityOracle: Send + Sync {
    /// Oracle name, used in logs.
    fn name(&self) -> &str;

    /// Submit a prompt and return the raw reply text.
    async fn complete(&self, prompt: &str) -> DomainResult<String>;
}
