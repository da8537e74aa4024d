//! Complexity analysis domain model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowest and highest complexity score.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Estimated hours never drop below half an hour.
pub const MIN_ESTIMATED_HOURS: f64 = 0.5;

/// Bounds for the recommended number of subtasks.
pub const MIN_SUBTASK_COUNT: usize = 2;
pub const MAX_SUBTASK_COUNT: usize = 10;

/// Complexity level classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        Self::Moderate
    }
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Expert => "expert",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trivial" => Some(Self::Trivial),
            "simple" => Some(Self::Simple),
            "moderate" => Some(Self::Moderate),
            "complex" => Some(Self::Complex),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }

    /// Map a clamped score onto a level: 1-2 trivial, 3-4 simple,
    /// 5-6 moderate, 7-8 complex, 9-10 expert.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Self::Trivial,
            3..=4 => Self::Simple,
            5..=6 => Self::Moderate,
            7..=8 => Self::Complex,
            _ => Self::Expert,
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a task should be broken down before scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownPolicy {
    /// Treat the task as atomic
    None,
    Optional,
    Recommended,
    Required,
}

impl Default for BreakdownPolicy {
    fn default() -> Self {
        Self::Optional
    }
}

impl BreakdownPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Optional => "optional",
            Self::Recommended => "recommended",
            Self::Required => "required",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "optional" => Some(Self::Optional),
            "recommended" => Some(Self::Recommended),
            "required" => Some(Self::Required),
            _ => None,
        }
    }

    /// Policy used by the heuristic estimate.
    pub fn from_score(score: u8) -> Self {
        if score >= 7 {
            Self::Required
        } else if score >= 5 {
            Self::Recommended
        } else {
            Self::Optional
        }
    }

    /// Whether the decomposer should attempt a breakdown at all.
    pub fn allows_breakdown(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for BreakdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Validated oracle reply
    Oracle,
    /// Deterministic fallback; lower confidence
    Heuristic,
}

/// Bounded complexity estimate for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub task_id: String,
    pub score: u8,
    pub level: ComplexityLevel,
    pub estimated_hours: f64,
    pub risk_factors: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
    pub skills_required: BTreeSet<String>,
    pub recommended_subtask_count: usize,
    pub breakdown_policy: BreakdownPolicy,
    pub reasoning: String,
    pub source: AnalysisSource,
}

impl ComplexityAnalysis {
    /// Clamp a raw score into `[MIN_SCORE, MAX_SCORE]`.
    pub fn clamp_score(raw: f64) -> u8 {
        if raw.is_nan() {
            return MIN_SCORE;
        }
        raw.round().clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
    }

    /// Clamp estimated hours to the lower bound.
    pub fn clamp_hours(raw: f64) -> f64 {
        if raw.is_nan() {
            return MIN_ESTIMATED_HOURS;
        }
        raw.max(MIN_ESTIMATED_HOURS)
    }

    /// Clamp a recommended subtask count into `[MIN_SUBTASK_COUNT, MAX_SUBTASK_COUNT]`.
    pub fn clamp_subtask_count(raw: i64) -> usize {
        raw.clamp(MIN_SUBTASK_COUNT as i64, MAX_SUBTASK_COUNT as i64) as usize
    }

    /// Default subtask count derived from a score: `ceil(score / 2) + 1`.
    pub fn subtask_count_for_score(score: u8) -> usize {
        Self::clamp_subtask_count(i64::from(score.div_ceil(2)) + 1)
    }

    /// Whether every documented bound holds.
    pub fn is_within_bounds(&self) -> bool {
        (MIN_SCORE..=MAX_SCORE).contains(&self.score)
            && self.estimated_hours >= MIN_ESTIMATED_HOURS
            && (MIN_SUBTASK_COUNT..=MAX_SUBTASK_COUNT).contains(&self.recommended_subtask_count)
    }

    pub fn is_heuristic(&self) -> bool {
        self.source == AnalysisSource::Heuristic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_score() {
        assert_eq!(ComplexityLevel::from_score(1), ComplexityLevel::Trivial);
        assert_eq!(ComplexityLevel::from_score(3), ComplexityLevel::Simple);
        assert_eq!(ComplexityLevel::from_score(5), ComplexityLevel::Moderate);
        assert_eq!(ComplexityLevel::from_score(8), ComplexityLevel::Complex);
        assert_eq!(ComplexityLevel::from_score(10), ComplexityLevel::Expert);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(ComplexityLevel::from_str("Complex"), Some(ComplexityLevel::Complex));
        assert_eq!(ComplexityLevel::from_str(" expert "), Some(ComplexityLevel::Expert));
        assert_eq!(ComplexityLevel::from_str("very_complex"), None);
    }

    #[test]
    fn test_policy_from_score() {
        assert_eq!(BreakdownPolicy::from_score(3), BreakdownPolicy::Optional);
        assert_eq!(BreakdownPolicy::from_score(5), BreakdownPolicy::Recommended);
        assert_eq!(BreakdownPolicy::from_score(7), BreakdownPolicy::Required);
        assert!(!BreakdownPolicy::None.allows_breakdown());
        assert!(BreakdownPolicy::Optional.allows_breakdown());
    }

    #[test]
    fn test_clamping() {
        assert_eq!(ComplexityAnalysis::clamp_score(-3.0), 1);
        assert_eq!(ComplexityAnalysis::clamp_score(42.0), 10);
        assert_eq!(ComplexityAnalysis::clamp_score(f64::NAN), 1);
        assert_eq!(ComplexityAnalysis::clamp_score(6.4), 6);
        assert!((ComplexityAnalysis::clamp_hours(0.1) - 0.5).abs() < f64::EPSILON);
        assert_eq!(ComplexityAnalysis::clamp_subtask_count(0), 2);
        assert_eq!(ComplexityAnalysis::clamp_subtask_count(25), 10);
    }

    #[test]
    fn test_subtask_count_for_score() {
        assert_eq!(ComplexityAnalysis::subtask_count_for_score(1), 2);
        assert_eq!(ComplexityAnalysis::subtask_count_for_score(3), 3);
        assert_eq!(ComplexityAnalysis::subtask_count_for_score(10), 6);
    }
}
