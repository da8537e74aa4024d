//! Taskforge - task decomposition and agent scheduling core
//!
//! Taskforge estimates the complexity of work items, breaks them into
//! dependency graphs of subtasks, and assigns runnable subtasks to the
//! least-loaded capable agent while keeping agent load consistent as agents
//! come and go.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the oracle port
//! - **Service Layer** (`services`): Analysis, decomposition, scheduling, events
//! - **Application Layer** (`application`): The submission flow
//! - **Adapters** (`adapters`): Oracle implementations
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskforge::adapters::oracles::OfflineOracle;
//! use taskforge::{AgentProfile, Config, Task, WorkCoordinator};
//!
//! # async fn example() -> taskforge::DomainResult<()> {
//! let coordinator = WorkCoordinator::from_config(Arc::new(OfflineOracle::new()), &Config::default());
//! coordinator.register_agent(AgentProfile::any("agent-1")).await;
//!
//! let submission = coordinator
//!     .submit(Task::new("t1", "Login", "Add OAuth login to the web app"), None)
//!     .await?;
//! println!("{} subtasks", submission.graph.len());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Submission, WorkCoordinator};
pub use domain::models::{
    AgentProfile, AssignmentId, AssignmentStatus, BreakdownPolicy, Capability, ComplexityAnalysis,
    ComplexityLevel, Config, ScheduledAssignment, Subtask, SubtaskGraph, SubtaskKey, SubtaskKind,
    SubtaskPriority, SubtaskStatus, Task, TaskContext,
};
pub use domain::ports::ComplexityOracle;
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AgentRegistry, ComplexityAnalyzer, DependencyResolver, EventBus, EventName, Scheduler,
    SchedulerStatus, SchedulingEvent, TaskDecomposer, UnregisterReport,
};
