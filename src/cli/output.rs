//! Output formatting utilities for the CLI.

use serde::Serialize;

use crate::domain::models::{ComplexityAnalysis, ScheduledAssignment, SubtaskGraph};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..."
/// if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Result of `taskforge analyze`.
#[derive(Debug, Serialize)]
pub struct AnalysisOutput {
    pub analysis: ComplexityAnalysis,
}

impl CommandOutput for AnalysisOutput {
    fn to_human(&self) -> String {
        let a = &self.analysis;
        let mut lines = vec![
            format!("Task: {}", a.task_id),
            format!("  Score: {}/10 ({})", a.score, a.level),
            format!("  Estimated hours: {:.1}", a.estimated_hours),
            format!("  Breakdown: {} ({} subtasks recommended)", a.breakdown_policy, a.recommended_subtask_count),
            format!("  Source: {}", if a.is_heuristic() { "heuristic" } else { "oracle" }),
        ];
        if !a.risk_factors.is_empty() {
            lines.push(format!("  Risks: {}", join(&a.risk_factors)));
        }
        if !a.skills_required.is_empty() {
            lines.push(format!("  Skills: {}", join(&a.skills_required)));
        }
        if !a.reasoning.is_empty() {
            lines.push(format!("  Reasoning: {}", truncate(&a.reasoning, 200)));
        }
        lines.join("\n")
    }
}

/// Result of `taskforge plan`.
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub analysis: ComplexityAnalysis,
    pub graph: SubtaskGraph,
    /// Present when agents were supplied and the graph was scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<ScheduledAssignment>>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let graph = &self.graph;
        let mut lines = vec![
            format!(
                "Task: {} (score {}, {} subtasks, {:?} graph)",
                graph.task_id(),
                self.analysis.score,
                graph.len(),
                graph.source()
            ),
            format!(
                "  Critical path: {} ({:.1}h of {:.1}h total)",
                graph.critical_path().join(" -> "),
                graph.critical_path_hours(),
                graph.total_estimated_hours()
            ),
        ];

        for subtask in graph.subtasks() {
            let deps = if subtask.depends_on.is_empty() {
                String::new()
            } else {
                format!(" after [{}]", join(&subtask.depends_on))
            };
            lines.push(format!(
                "  - {} [{} / {}] {:.1}h {}{}",
                subtask.id,
                subtask.kind,
                subtask.priority.as_str(),
                subtask.estimated_hours,
                truncate(&subtask.title, 60),
                deps
            ));
        }

        if let Some(assignments) = &self.assignments {
            lines.push(format!("  Assignments: {}", assignments.len()));
            for assignment in assignments {
                lines.push(format!("    {} -> {}", assignment.subtask.subtask_id, assignment.agent_id));
            }
        }
        lines.join("\n")
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
