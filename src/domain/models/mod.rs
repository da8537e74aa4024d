pub mod agent;
pub mod assignment;
pub mod complexity;
pub mod config;
pub mod subtask;
pub mod task;

pub use agent::{AgentProfile, Capability, WILDCARD_CAPABILITY};
pub use assignment::{
    AssignmentId, AssignmentStatus, ScheduledAssignment, SubtaskKey, SubtaskStatus,
};
pub use complexity::{
    AnalysisSource, BreakdownPolicy, ComplexityAnalysis, ComplexityLevel, MAX_SCORE,
    MAX_SUBTASK_COUNT, MIN_ESTIMATED_HOURS, MIN_SCORE, MIN_SUBTASK_COUNT,
};
pub use config::{
    AnalyzerConfig, Config, DecomposerConfig, LoggingConfig, OracleConfig, SchedulerConfig,
};
pub use subtask::{GraphSource, Subtask, SubtaskGraph, SubtaskKind, SubtaskPriority};
pub use task::{Task, TaskContext};
