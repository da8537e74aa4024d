//! Complexity analysis service.
//!
//! Asks the complexity oracle for an estimate, validates and clamps the
//! reply, and falls back to a deterministic heuristic whenever the oracle
//! fails, hangs or replies with something unusable. Callers always get a
//! bounded [`ComplexityAnalysis`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AnalysisSource, AnalyzerConfig, BreakdownPolicy, ComplexityAnalysis, ComplexityLevel, Task,
    TaskContext,
};
use crate::domain::ports::ComplexityOracle;

use super::{
    extract_json_from_response, number_field, parse_object, string_field, string_list_field,
    with_oracle_timeout,
};

/// Words that push the heuristic estimate up.
pub const COMPLEXITY_KEYWORDS: [&str; 9] = [
    "architecture",
    "design",
    "system",
    "integration",
    "performance",
    "security",
    "database",
    "api",
    "framework",
];

const HEURISTIC_BASE_SCORE: i32 = 5;
const HEURISTIC_SHORT_SCORE: i32 = 3;
const HEURISTIC_LONG_SCORE: i32 = 7;
const HEURISTIC_KEYWORD_BONUS: i32 = 2;
const SHORT_DESCRIPTION_WORDS: usize = 10;
const LONG_DESCRIPTION_WORDS: usize = 50;

// Keys accepted for each reply field, snake_case and camelCase.
const SCORE_KEYS: &[&str] = &["score", "complexityScore", "complexity_score"];
const LEVEL_KEYS: &[&str] = &["level", "complexityLevel", "complexity_level"];
const HOURS_KEYS: &[&str] = &["estimated_hours", "estimatedHours"];
const RISK_KEYS: &[&str] = &["risk_factors", "riskFactors"];
const DEPENDENCY_KEYS: &[&str] = &["dependencies"];
const SKILL_KEYS: &[&str] = &["skills_required", "skillsRequired"];
const COUNT_KEYS: &[&str] = &["recommended_subtask_count", "recommendedSubtaskCount"];
const POLICY_KEYS: &[&str] = &["breakdown_policy", "breakdownPolicy"];
const REASONING_KEYS: &[&str] = &["reasoning"];

/// Produces bounded complexity estimates for tasks.
pub struct ComplexityAnalyzer {
    oracle: Arc<dyn ComplexityOracle>,
    timeout: Duration,
}

impl ComplexityAnalyzer {
    pub fn new(oracle: Arc<dyn ComplexityOracle>, config: &AnalyzerConfig) -> Self {
        Self {
            oracle,
            timeout: Duration::from_secs(config.oracle_timeout_secs),
        }
    }

    /// Override the bounded wait on oracle replies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze a task. Never fails: oracle problems degrade to
    /// [`heuristic`](Self::heuristic).
    #[instrument(skip(self, task, context), fields(task_id = %task.id, oracle = self.oracle.name()))]
    pub async fn analyze(&self, task: &Task, context: Option<&TaskContext>) -> ComplexityAnalysis {
        let prompt = self.build_prompt(task, context);

        let outcome = match with_oracle_timeout(self.timeout, self.oracle.complete(&prompt)).await {
            Ok(reply) => Self::parse_reply(&task.id, &reply),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(analysis) => {
                info!(
                    score = analysis.score,
                    level = analysis.level.as_str(),
                    policy = analysis.breakdown_policy.as_str(),
                    "Complexity analysis complete"
                );
                analysis
            }
            Err(err) => {
                warn!(error = %err, "Complexity oracle failed, using heuristic estimate");
                Self::heuristic(task)
            }
        }
    }

    /// Build the oracle prompt for a task and optional project context.
    pub fn build_prompt(&self, task: &Task, context: Option<&TaskContext>) -> String {
        let context_text = match context {
            Some(ctx) if !ctx.is_empty() => {
                let mut lines = Vec::new();
                if let Some(project_type) = &ctx.project_type {
                    lines.push(format!("- Project type: {project_type}"));
                }
                if !ctx.tech_stack.is_empty() {
                    lines.push(format!("- Tech stack: {}", ctx.tech_stack.join(", ")));
                }
                if let Some(team_size) = ctx.team_size {
                    lines.push(format!("- Team size: {team_size}"));
                }
                if let Some(timeline) = &ctx.timeline {
                    lines.push(format!("- Timeline: {timeline}"));
                }
                lines.join("\n")
            }
            _ => "No additional context".to_string(),
        };

        format!(
            r#"You are a software task complexity analyst.

## Task
ID: {}
Title: {}
Description: {}

## Project Context
{}

## Instructions
Estimate how complex this task is for a single engineer and whether it
should be broken into smaller subtasks.

## Required Output Format (JSON)
Respond with a JSON object containing:
```json
{{
  "score": 1-10,
  "level": "trivial|simple|moderate|complex|expert",
  "estimated_hours": 0.5,
  "risk_factors": ["risk"],
  "dependencies": ["external dependency"],
  "skills_required": ["skill"],
  "recommended_subtask_count": 2-10,
  "breakdown_policy": "none|optional|recommended|required",
  "reasoning": "Brief explanation"
}}
```

IMPORTANT: Output ONLY the JSON object, no other text."#,
            task.id, task.title, task.description, context_text
        )
    }

    /// Validate and clamp an oracle reply.
    ///
    /// Fails with [`DomainError::MalformedOracleReply`] when the reply holds
    /// no JSON object or the object carries no numeric score. Every other
    /// field falls back to its default when missing or of the wrong type.
    pub fn parse_reply(task_id: &str, reply: &str) -> DomainResult<ComplexityAnalysis> {
        let json = extract_json_from_response(reply).ok_or_else(|| {
            DomainError::MalformedOracleReply("reply contains no JSON object".to_string())
        })?;
        let raw = parse_object(json)?;

        let raw_score = number_field(&raw, SCORE_KEYS)
            .ok_or_else(|| DomainError::MalformedOracleReply("reply has no numeric score".to_string()))?;
        let score = ComplexityAnalysis::clamp_score(raw_score);

        let level = string_field(&raw, LEVEL_KEYS)
            .and_then(ComplexityLevel::from_str)
            .unwrap_or_default();
        let breakdown_policy = string_field(&raw, POLICY_KEYS)
            .and_then(BreakdownPolicy::from_str)
            .unwrap_or_default();

        let estimated_hours = ComplexityAnalysis::clamp_hours(
            number_field(&raw, HOURS_KEYS).unwrap_or_else(|| f64::from(score) * 2.0),
        );
        #[allow(clippy::cast_possible_truncation)]
        let recommended_subtask_count = number_field(&raw, COUNT_KEYS).map_or_else(
            || ComplexityAnalysis::subtask_count_for_score(score),
            |count| ComplexityAnalysis::clamp_subtask_count(count.round() as i64),
        );

        debug!(task_id, raw_score, score, "Parsed oracle complexity reply");

        Ok(ComplexityAnalysis {
            task_id: task_id.to_string(),
            score,
            level,
            estimated_hours,
            risk_factors: string_list_field(&raw, RISK_KEYS).into_iter().collect(),
            dependencies: string_list_field(&raw, DEPENDENCY_KEYS).into_iter().collect(),
            skills_required: string_list_field(&raw, SKILL_KEYS).into_iter().collect(),
            recommended_subtask_count,
            breakdown_policy,
            reasoning: string_field(&raw, REASONING_KEYS).unwrap_or_default().to_string(),
            source: AnalysisSource::Oracle,
        })
    }

    /// Deterministic estimate computed from the description alone.
    pub fn heuristic(task: &Task) -> ComplexityAnalysis {
        let word_count = task.description_word_count();
        let matched = matched_keywords(&task.description);

        let mut raw = if word_count < SHORT_DESCRIPTION_WORDS {
            HEURISTIC_SHORT_SCORE
        } else if word_count > LONG_DESCRIPTION_WORDS {
            HEURISTIC_LONG_SCORE
        } else {
            HEURISTIC_BASE_SCORE
        };
        if !matched.is_empty() {
            raw += HEURISTIC_KEYWORD_BONUS;
        }

        let score = ComplexityAnalysis::clamp_score(f64::from(raw));
        let keywords_text = if matched.is_empty() {
            "none".to_string()
        } else {
            matched.iter().copied().collect::<Vec<_>>().join(", ")
        };

        ComplexityAnalysis {
            task_id: task.id.clone(),
            score,
            level: ComplexityLevel::from_score(score),
            estimated_hours: ComplexityAnalysis::clamp_hours(f64::from(score) * 2.0),
            risk_factors: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            skills_required: BTreeSet::new(),
            recommended_subtask_count: ComplexityAnalysis::subtask_count_for_score(score),
            breakdown_policy: BreakdownPolicy::from_score(score),
            reasoning: format!(
                "Heuristic estimate: {word_count} words in description, complexity keywords: {keywords_text}"
            ),
            source: AnalysisSource::Heuristic,
        }
    }
}

/// Complexity keywords found in `text`. A word matches when it starts with
/// a keyword, so "designing" and "APIs" count.
fn matched_keywords(text: &str) -> BTreeSet<&'static str> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .flat_map(|word| {
            COMPLEXITY_KEYWORDS
                .iter()
                .copied()
                .filter(move |keyword| word.starts_with(keyword))
        })
        .collect()
}
