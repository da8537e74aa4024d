//! Task decomposition service.
//!
//! Turns a task plus its complexity analysis into a [`SubtaskGraph`]:
//!
//! - breakdown policy `none`: a one-node graph holding the task itself
//! - otherwise: an oracle breakdown, repaired field by field and then
//!   validated as a DAG
//! - oracle unavailable, malformed or empty reply: the fixed
//!   setup -> implementation -> testing chain
//!
//! Structural problems in an oracle breakdown (cycles, duplicate ids,
//! references outside the graph) are returned as errors, never repaired.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ComplexityAnalysis, DecomposerConfig, GraphSource, Subtask, SubtaskGraph, SubtaskKind,
    SubtaskPriority, Task,
};
use crate::domain::ports::ComplexityOracle;

use super::dependency_resolver::DependencyResolver;
use super::{
    extract_json_from_response, field, number_field, parse_object, string_field, string_list_field,
    with_oracle_timeout,
};

const FALLBACK_SETUP_HOURS: f64 = 1.0;
const FALLBACK_IMPLEMENTATION_MIN_HOURS: f64 = 2.0;
const FALLBACK_IMPLEMENTATION_SHARE: f64 = 0.6;
const FALLBACK_TESTING_MIN_HOURS: f64 = 1.0;
const FALLBACK_TESTING_SHARE: f64 = 0.3;

// Keys accepted for each reply field, snake_case and camelCase.
const SUBTASK_LIST_KEYS: &[&str] = &["subtasks", "tasks"];
const ID_KEYS: &[&str] = &["id"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const KIND_KEYS: &[&str] = &["kind", "type"];
const PRIORITY_KEYS: &[&str] = &["priority"];
const HOURS_KEYS: &[&str] = &["estimated_hours", "estimatedHours"];
const DEPENDS_ON_KEYS: &[&str] = &["depends_on", "dependsOn", "dependencies"];
const SKILL_KEYS: &[&str] = &["skills_required", "skillsRequired"];
const CRITERIA_KEYS: &[&str] = &["acceptance_criteria", "acceptanceCriteria"];

/// One oracle subtask, read field by field. Fields that are missing or of
/// the wrong type are `None` or empty.
#[derive(Debug, Default)]
struct RawSubtask {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    kind: Option<String>,
    priority: Option<String>,
    estimated_hours: Option<f64>,
    /// Ids, titles, or 1-based positions of other subtasks
    depends_on: Vec<Value>,
    skills_required: Vec<String>,
    acceptance_criteria: Vec<String>,
}

impl RawSubtask {
    fn from_value(value: &Value) -> Self {
        let Value::Object(object) = value else {
            // A bare string is taken as the title
            return Self {
                title: value.as_str().map(str::to_string),
                ..Self::default()
            };
        };
        let text = |keys: &[&str]| string_field(object, keys).map(str::to_string);

        let id = match field(object, ID_KEYS) {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => text(ID_KEYS),
        };
        // A single reference is as good as a one-element list
        let depends_on = match field(object, DEPENDS_ON_KEYS) {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };

        Self {
            id,
            title: text(TITLE_KEYS),
            description: text(DESCRIPTION_KEYS),
            kind: text(KIND_KEYS),
            priority: text(PRIORITY_KEYS),
            estimated_hours: number_field(object, HOURS_KEYS),
            depends_on,
            skills_required: string_list_field(object, SKILL_KEYS),
            acceptance_criteria: string_list_field(object, CRITERIA_KEYS),
        }
    }
}

/// Breaks tasks into subtask graphs.
pub struct TaskDecomposer {
    oracle: Arc<dyn ComplexityOracle>,
    timeout: Duration,
    resolver: DependencyResolver,
}

impl TaskDecomposer {
    pub fn new(oracle: Arc<dyn ComplexityOracle>, config: &DecomposerConfig) -> Self {
        Self {
            oracle,
            timeout: Duration::from_secs(config.oracle_timeout_secs),
            resolver: DependencyResolver::new(),
        }
    }

    /// Override the bounded wait on oracle replies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decompose a task.
    ///
    /// `target_subtask_count` defaults to the analysis recommendation and is
    /// clamped to the same bounds. Oracle failures never surface here; only
    /// structural errors in an oracle breakdown do.
    #[instrument(skip(self, task, analysis), fields(task_id = %task.id, policy = %analysis.breakdown_policy))]
    pub async fn decompose(
        &self,
        task: &Task,
        analysis: &ComplexityAnalysis,
        target_subtask_count: Option<usize>,
    ) -> DomainResult<SubtaskGraph> {
        if !analysis.breakdown_policy.allows_breakdown() {
            info!("Breakdown not warranted, treating task as atomic");
            return self.atomic_graph(task, analysis);
        }

        let target = ComplexityAnalysis::clamp_subtask_count(
            i64::try_from(target_subtask_count.unwrap_or(analysis.recommended_subtask_count))
                .unwrap_or(i64::MAX),
        );
        let prompt = self.build_prompt(task, analysis, target);

        let raw = match with_oracle_timeout(self.timeout, self.oracle.complete(&prompt))
            .await
            .and_then(|reply| Self::parse_reply(&reply))
        {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => {
                warn!("Oracle returned no subtasks, using fallback chain");
                return self.fallback_graph(task, analysis);
            }
            Err(err) => {
                warn!(error = %err, "Decomposition oracle failed, using fallback chain");
                return self.fallback_graph(task, analysis);
            }
        };

        let subtasks = Self::normalize(task, analysis, raw);
        match self.resolver.build_graph(&task.id, subtasks, GraphSource::Oracle) {
            Ok(graph) => {
                info!(
                    subtasks = graph.len(),
                    critical_path_hours = graph.critical_path_hours(),
                    total_hours = graph.total_estimated_hours(),
                    "Task decomposed"
                );
                Ok(graph)
            }
            Err(err) => {
                warn!(error = %err, "Rejecting structurally invalid decomposition");
                Err(err)
            }
        }
    }

    /// One-node graph containing the task itself.
    pub fn atomic_graph(&self, task: &Task, analysis: &ComplexityAnalysis) -> DomainResult<SubtaskGraph> {
        let subtask = Subtask::new(task.id.clone(), task.id.clone(), task.title.clone())
            .with_description(task.description.clone())
            .with_kind(SubtaskKind::Implementation)
            .with_priority(SubtaskPriority::Medium)
            .with_hours(analysis.estimated_hours)
            .with_skills(analysis.skills_required.iter().cloned());

        self.resolver.build_graph(&task.id, vec![subtask], GraphSource::Atomic)
    }

    /// Fixed setup -> implementation -> testing chain.
    pub fn fallback_graph(&self, task: &Task, analysis: &ComplexityAnalysis) -> DomainResult<SubtaskGraph> {
        let hours = analysis.estimated_hours;
        let setup_id = synthesized_id(&task.id, 1);
        let implementation_id = synthesized_id(&task.id, 2);
        let testing_id = synthesized_id(&task.id, 3);

        let setup = Subtask::new(setup_id.clone(), task.id.clone(), format!("Setup: {}", task.title))
            .with_description(format!("Prepare the environment and scaffolding for: {}", task.title))
            .with_kind(SubtaskKind::Setup)
            .with_priority(SubtaskPriority::Medium)
            .with_hours(FALLBACK_SETUP_HOURS)
            .with_acceptance_criteria(vec!["Environment ready for implementation".to_string()]);

        let implementation = Subtask::new(
            implementation_id.clone(),
            task.id.clone(),
            format!("Implement: {}", task.title),
        )
        .with_description(task.description.clone())
        .with_kind(SubtaskKind::Implementation)
        .with_priority(SubtaskPriority::High)
        .with_hours((FALLBACK_IMPLEMENTATION_SHARE * hours).max(FALLBACK_IMPLEMENTATION_MIN_HOURS))
        .with_dependencies([setup_id])
        .with_skills(analysis.skills_required.iter().cloned())
        .with_acceptance_criteria(vec!["Functionality implemented as described".to_string()]);

        let testing = Subtask::new(testing_id, task.id.clone(), format!("Test: {}", task.title))
            .with_description(format!("Verify the implementation of: {}", task.title))
            .with_kind(SubtaskKind::Testing)
            .with_priority(SubtaskPriority::Medium)
            .with_hours((FALLBACK_TESTING_SHARE * hours).max(FALLBACK_TESTING_MIN_HOURS))
            .with_dependencies([implementation_id])
            .with_acceptance_criteria(vec!["Tests cover the new behavior and pass".to_string()]);

        self.resolver
            .build_graph(&task.id, vec![setup, implementation, testing], GraphSource::Fallback)
    }

    /// Build the breakdown prompt.
    pub fn build_prompt(&self, task: &Task, analysis: &ComplexityAnalysis, target: usize) -> String {
        let list = |items: &BTreeSet<String>, empty: &str| {
            if items.is_empty() {
                empty.to_string()
            } else {
                items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
            }
        };

        format!(
            r#"You are a task decomposition assistant for a pool of software agents.

## Task to Decompose
ID: {}
Title: {}
Description: {}
Complexity: {} ({}/10), about {} hours

## Risk Factors
{}

## Required Skills
{}

## External Dependencies
{}

## Instructions
Break this task into about {} subtasks. Each subtask must be achievable by a
single agent. Subtasks may depend only on other subtasks in this list, and
dependencies must not form a cycle.

## Required Output Format (JSON)
Respond with a JSON object containing:
```json
{{
  "subtasks": [
    {{
      "id": "short-unique-id",
      "title": "Short subtask title",
      "description": "What needs to be done",
      "kind": "setup|implementation|testing|documentation|integration",
      "priority": "low|medium|high|critical",
      "estimated_hours": 2.0,
      "depends_on": ["ids of subtasks that must finish first"],
      "skills_required": ["skill"],
      "acceptance_criteria": ["criterion"]
    }}
  ]
}}
```

IMPORTANT: Output ONLY the JSON object, no other text."#,
            task.id,
            task.title,
            task.description,
            analysis.level,
            analysis.score,
            analysis.estimated_hours,
            list(&analysis.risk_factors, "None identified"),
            list(&analysis.skills_required, "None specified"),
            list(&analysis.dependencies, "None"),
            target
        )
    }

    fn parse_reply(reply: &str) -> DomainResult<Vec<RawSubtask>> {
        let json = extract_json_from_response(reply).ok_or_else(|| {
            DomainError::MalformedOracleReply("reply contains no JSON object".to_string())
        })?;
        let raw = parse_object(json)?;
        match field(&raw, SUBTASK_LIST_KEYS) {
            Some(Value::Array(items)) => Ok(items.iter().map(RawSubtask::from_value).collect()),
            _ => Err(DomainError::MalformedOracleReply(
                "reply has no subtask list".to_string(),
            )),
        }
    }

    /// Fill defaults, synthesize ids and resolve dependency references.
    fn normalize(task: &Task, analysis: &ComplexityAnalysis, raw: Vec<RawSubtask>) -> Vec<Subtask> {
        #[allow(clippy::cast_precision_loss)]
        let default_hours = analysis.estimated_hours / raw.len() as f64;

        let ids: Vec<String> = raw
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                r.id.as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map_or_else(|| synthesized_id(&task.id, idx + 1), str::to_string)
            })
            .collect();
        let titles: Vec<String> = raw
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                r.title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map_or_else(|| format!("Subtask {}", idx + 1), str::to_string)
            })
            .collect();

        let known_ids: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        let by_title: HashMap<&str, &str> = titles
            .iter()
            .zip(&ids)
            .map(|(title, id)| (title.as_str(), id.as_str()))
            .collect();

        // References that name no subtask are kept verbatim so validation
        // rejects the graph instead of losing the edge
        let resolve = |reference: &Value| -> String {
            match reference {
                Value::String(s) => {
                    let s = s.trim();
                    if known_ids.contains(s) {
                        s.to_string()
                    } else {
                        by_title.get(s).map_or_else(|| s.to_string(), |id| (*id).to_string())
                    }
                }
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|p| usize::try_from(p).ok())
                    .and_then(|p| p.checked_sub(1))
                    .and_then(|idx| ids.get(idx).cloned())
                    .unwrap_or_else(|| n.to_string()),
                other => other.to_string(),
            }
        };

        raw.into_iter()
            .enumerate()
            .map(|(idx, r)| {
                let depends_on: BTreeSet<String> = r.depends_on.iter().map(&resolve).collect();

                Subtask::new(ids[idx].clone(), task.id.clone(), titles[idx].clone())
                    .with_description(r.description.unwrap_or_default())
                    .with_kind(r.kind.as_deref().and_then(SubtaskKind::from_str).unwrap_or_default())
                    .with_priority(
                        r.priority
                            .as_deref()
                            .and_then(SubtaskPriority::from_str)
                            .unwrap_or_default(),
                    )
                    .with_hours(r.estimated_hours.unwrap_or(default_hours))
                    .with_dependencies(depends_on)
                    .with_skills(r.skills_required)
                    .with_acceptance_criteria(r.acceptance_criteria)
            })
            .collect()
    }
}

fn synthesized_id(task_id: &str, position: usize) -> String {
    format!("{task_id}-subtask-{position}")
}
