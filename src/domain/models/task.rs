//! Task domain model.
//!
//! A task is the unit of work a caller submits. It is analyzed for
//! complexity and then broken down into a subtask graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work submitted by a caller. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-visible identifier, also used to derive subtask ids
    pub id: String,

    /// Short title
    pub title: String,

    /// Free-form description analyzed by the complexity oracle
    pub description: String,
}

impl Task {
    /// Create a task with an explicit id.
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    /// Create a task with a generated id.
    pub fn with_generated_id(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(format!("task-{}", Uuid::new_v4().simple()), title, description)
    }

    /// Number of whitespace-separated words in the description.
    pub fn description_word_count(&self) -> usize {
        self.description.split_whitespace().count()
    }
}

/// Optional project context forwarded to the complexity oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub project_type: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub team_size: Option<u32>,
    pub timeline: Option<String>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    pub fn with_tech_stack(mut self, stack: Vec<String>) -> Self {
        self.tech_stack = stack;
        self
    }

    pub fn with_team_size(mut self, size: u32) -> Self {
        self.team_size = Some(size);
        self
    }

    pub fn with_timeline(mut self, timeline: impl Into<String>) -> Self {
        self.timeline = Some(timeline.into());
        self
    }

    /// Whether any context field is populated.
    pub fn is_empty(&self) -> bool {
        self.project_type.is_none()
            && self.tech_stack.is_empty()
            && self.team_size.is_none()
            && self.timeline.is_none()
    }
}
