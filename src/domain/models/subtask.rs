//! Subtask and subtask graph domain models.
//!
//! Subtasks are the nodes of a directed acyclic graph derived from one
//! task. A graph is only ever built through
//! [`DependencyResolver::build_graph`](crate::services::DependencyResolver::build_graph),
//! which rejects cycles, duplicate ids and references to unknown subtasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::complexity::MIN_ESTIMATED_HOURS;

/// Kind of work a subtask represents. Doubles as the subtask's required
/// agent capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKind {
    Setup,
    Implementation,
    Testing,
    Documentation,
    Integration,
}

impl Default for SubtaskKind {
    fn default() -> Self {
        Self::Implementation
    }
}

impl SubtaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Integration => "integration",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "setup" => Some(Self::Setup),
            "implementation" => Some(Self::Implementation),
            "testing" | "test" => Some(Self::Testing),
            "documentation" | "docs" => Some(Self::Documentation),
            "integration" => Some(Self::Integration),
            _ => None,
        }
    }
}

impl fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for SubtaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl SubtaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A node in a subtask graph. Immutable once the graph is built; its
/// scheduling status is tracked by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique within its graph
    pub id: String,

    /// Owning task
    pub task_id: String,

    pub title: String,
    pub description: String,
    pub kind: SubtaskKind,
    pub priority: SubtaskPriority,
    pub estimated_hours: f64,

    /// Ids of subtasks in the same graph that must complete first
    pub depends_on: BTreeSet<String>,

    pub skills_required: BTreeSet<String>,
    pub acceptance_criteria: Vec<String>,
}

impl Subtask {
    /// Create a subtask with default kind, priority and minimum hours.
    pub fn new(id: impl Into<String>, task_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            title: title.into(),
            description: String::new(),
            kind: SubtaskKind::default(),
            priority: SubtaskPriority::default(),
            estimated_hours: MIN_ESTIMATED_HOURS,
            depends_on: BTreeSet::new(),
            skills_required: BTreeSet::new(),
            acceptance_criteria: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_kind(mut self, kind: SubtaskKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_priority(mut self, priority: SubtaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set estimated hours, clamped to the half-hour minimum.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = if hours.is_nan() {
            MIN_ESTIMATED_HOURS
        } else {
            hours.max(MIN_ESTIMATED_HOURS)
        };
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills_required = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    /// The capability an agent must declare to run this subtask.
    pub fn required_type(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// How a graph was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphSource {
    /// Breakdown not warranted; the task itself is the only node
    Atomic,
    /// Validated oracle breakdown
    Oracle,
    /// Fixed setup -> implementation -> testing chain
    Fallback,
}

/// All subtasks derived from one task plus the derived critical path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskGraph {
    task_id: String,
    subtasks: Vec<Subtask>,
    critical_path: Vec<String>,
    critical_path_hours: f64,
    total_estimated_hours: f64,
    source: GraphSource,
}

impl SubtaskGraph {
    /// Assemble a graph from already-validated parts.
    pub(crate) fn from_parts(
        task_id: String,
        subtasks: Vec<Subtask>,
        critical_path: Vec<String>,
        critical_path_hours: f64,
        source: GraphSource,
    ) -> Self {
        let total_estimated_hours = subtasks.iter().map(|s| s.estimated_hours).sum();
        Self {
            task_id,
            subtasks,
            critical_path,
            critical_path_hours,
            total_estimated_hours,
            source,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Subtasks in insertion order.
    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn get(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Ordered ids of the longest dependency chain by estimated hours.
    pub fn critical_path(&self) -> &[String] {
        &self.critical_path
    }

    /// Sum of hours along the critical path.
    pub fn critical_path_hours(&self) -> f64 {
        self.critical_path_hours
    }

    /// Sum of hours of every subtask.
    pub fn total_estimated_hours(&self) -> f64 {
        self.total_estimated_hours
    }

    pub fn source(&self) -> GraphSource {
        self.source
    }

    pub fn is_atomic(&self) -> bool {
        self.source == GraphSource::Atomic
    }

    /// Consume the graph, yielding its subtasks.
    pub fn into_subtasks(self) -> Vec<Subtask> {
        self.subtasks
    }
}
