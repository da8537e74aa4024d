//! Scheduling entries and assignments.
//!
//! A [`ScheduledAssignment`] binds one runnable subtask to the agent
//! executing it. The scheduler owns every assignment and is the only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Subtask ids are only unique within their graph, so scheduling state is
/// keyed by the owning task as well.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubtaskKey {
    pub task_id: String,
    pub subtask_id: String,
}

impl SubtaskKey {
    pub fn new(task_id: impl Into<String>, subtask_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            subtask_id: subtask_id.into(),
        }
    }
}

impl fmt::Display for SubtaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task_id, self.subtask_id)
    }
}

/// Scheduling status of a subtask.
///
/// `pending -> runnable -> assigned -> running -> {completed | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    /// Waiting on dependencies
    Pending,
    /// Dependencies completed, no agent bound
    Runnable,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl SubtaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Runnable => "runnable",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether an agent is currently bound.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Assigned | Self::Running)
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Running,
    Completed,
    Failed,
    /// Agent left and no replacement was found; the subtask went back to runnable
    Released,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Released => "released",
        }
    }

    /// Whether the assignment counts towards its agent's load.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::Running)
    }

    /// Allowed moves. Terminal statuses never change; a running assignment
    /// may drop back to assigned when it moves to another agent.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Assigned => true,
            Self::Running => next != Self::Running,
            Self::Completed | Self::Failed | Self::Released => false,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding between a runnable subtask and the agent executing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAssignment {
    pub id: AssignmentId,
    pub subtask: SubtaskKey,
    pub agent_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Result payload reported on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error reported on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduledAssignment {
    pub fn new(subtask: SubtaskKey, agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentId::new(),
            subtask,
            agent_id: agent_id.into(),
            status: AssignmentStatus::Assigned,
            assigned_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub(crate) fn transition(&mut self, status: AssignmentStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
                reason: format!("assignment {} is {}", self.id, self.status),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
