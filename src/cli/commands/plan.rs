use anyhow::{Context, Result};

use crate::application::WorkCoordinator;
use crate::cli::output::{output, PlanOutput};
use crate::cli::types::PlanArgs;
use crate::domain::models::Config;

use super::build_oracle;

/// Handle `taskforge plan`.
///
/// Without agents the graph is only printed. With agents they are
/// registered on a fresh scheduler and the graph goes through one
/// submission pass.
pub async fn execute(args: PlanArgs, config: &Config, offline: bool, json: bool) -> Result<()> {
    let coordinator = WorkCoordinator::from_config(build_oracle(config, offline), config);
    let task = args.task.to_task();
    let context = args.task.to_context();

    let result = if args.agents.is_empty() {
        let (analysis, graph) = coordinator
            .plan(&task, context.as_ref())
            .await
            .context("Failed to decompose task")?;
        PlanOutput {
            analysis,
            graph,
            assignments: None,
        }
    } else {
        for agent in args.agents {
            coordinator.register_agent(agent).await;
        }
        let submission = coordinator
            .submit(task, context.as_ref())
            .await
            .context("Failed to schedule task")?;
        PlanOutput {
            analysis: submission.analysis,
            graph: submission.graph,
            assignments: Some(submission.assignments),
        }
    };

    output(&result, json);
    Ok(())
}
