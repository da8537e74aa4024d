//! Domain errors for the Taskforge scheduling core.

use thiserror::Error;

/// Format a cycle path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    let mut rendered = path.join(" -> ");
    if let Some(first) = path.first() {
        rendered.push_str(" -> ");
        rendered.push_str(first);
    }
    rendered
}

/// Domain-level errors that can occur in the Taskforge core.
///
/// Oracle-facing variants are absorbed by the analyzer and decomposer and
/// never reach callers of those components. Scheduling variants are reported
/// upward; structural variants reject the decomposition that produced them.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Complexity oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Malformed oracle reply: {0}")]
    MalformedOracleReply(String),

    #[error("No capable agent available for subtask {subtask_id}")]
    NoCapableAgent { subtask_id: String },

    #[error("Subtask dependency cycle detected: {}", format_cycle_path(.0))]
    CyclicDependency(Vec<String>),

    #[error("Subtask {subtask_id} depends on unknown subtask {dependency_id}")]
    UnknownDependency {
        subtask_id: String,
        dependency_id: String,
    },

    #[error("Duplicate subtask id in graph: {0}")]
    DuplicateSubtaskId(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error("Subtask {subtask_id} has unmet dependencies: {pending:?}")]
    DependenciesNotSatisfied {
        subtask_id: String,
        pending: Vec<String>,
    },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Load invariant violated for agent {agent_id}: recorded {recorded}, actual {actual}")]
    LoadInvariantViolated {
        agent_id: String,
        recorded: usize,
        actual: usize,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DomainError {
    /// Whether the caller may reasonably retry the operation later
    /// (after adding capacity or once the oracle recovers).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoCapableAgent { .. } | Self::OracleUnavailable(_) | Self::MalformedOracleReply(_)
        )
    }

    /// Whether the error describes a structurally invalid subtask graph.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency(_) | Self::UnknownDependency { .. } | Self::DuplicateSubtaskId(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::MalformedOracleReply(err.to_string())
    }
}
