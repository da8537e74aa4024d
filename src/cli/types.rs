//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::{AgentProfile, Task, TaskContext};

#[derive(Parser)]
#[command(name = "taskforge")]
#[command(about = "Taskforge - task decomposition and agent scheduling", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Skip the oracle and use the deterministic fallbacks
    #[arg(long, global = true)]
    pub offline: bool,

    /// Load configuration from this file instead of .taskforge/
    #[arg(short, long, global = true, env = "TASKFORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate the complexity of a task
    Analyze(TaskArgs),

    /// Decompose a task into a subtask graph, optionally scheduling it
    Plan(PlanArgs),
}

/// Task description shared by every command
#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Task title
    #[arg(short, long)]
    pub title: String,

    /// Task description
    #[arg(short, long)]
    pub description: String,

    /// Task id (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Project type, e.g. "web service"
    #[arg(long)]
    pub project_type: Option<String>,

    /// Technologies in use (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tech_stack: Vec<String>,

    /// Team size
    #[arg(long)]
    pub team_size: Option<u32>,

    /// Expected timeline, e.g. "two weeks"
    #[arg(long)]
    pub timeline: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub task: TaskArgs,

    /// Agents to schedule onto: `id` (runs anything) or `id=tag,tag`
    #[arg(short, long = "agent", value_parser = parse_agent)]
    pub agents: Vec<AgentProfile>,
}

impl TaskArgs {
    pub fn to_task(&self) -> Task {
        match &self.id {
            Some(id) => Task::new(id.clone(), self.title.clone(), self.description.clone()),
            None => Task::with_generated_id(self.title.clone(), self.description.clone()),
        }
    }

    pub fn to_context(&self) -> Option<TaskContext> {
        let mut context = TaskContext::new().with_tech_stack(self.tech_stack.clone());
        if let Some(project_type) = &self.project_type {
            context = context.with_project_type(project_type.clone());
        }
        if let Some(team_size) = self.team_size {
            context = context.with_team_size(team_size);
        }
        if let Some(timeline) = &self.timeline {
            context = context.with_timeline(timeline.clone());
        }
        (!context.is_empty()).then_some(context)
    }
}

/// Parse `id` or `id=tag1,tag2` into an agent profile.
pub fn parse_agent(raw: &str) -> Result<AgentProfile, String> {
    let (id, tags) = match raw.split_once('=') {
        Some((id, tags)) => (id.trim(), Some(tags)),
        None => (raw.trim(), None),
    };
    if id.is_empty() {
        return Err(format!("agent id missing in '{raw}'"));
    }

    Ok(match tags {
        Some(tags) => {
            let tags: Vec<&str> = tags.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
            if tags.is_empty() {
                return Err(format!("agent '{id}' lists no capability tags"));
            }
            AgentProfile::with_tags(id, tags)
        }
        None => AgentProfile::any(id),
    })
}
