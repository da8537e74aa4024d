use anyhow::Result;

use crate::cli::output::{output, AnalysisOutput};
use crate::cli::types::TaskArgs;
use crate::domain::models::Config;
use crate::services::ComplexityAnalyzer;

use super::build_oracle;

/// Handle `taskforge analyze`.
pub async fn execute(args: TaskArgs, config: &Config, offline: bool, json: bool) -> Result<()> {
    let analyzer = ComplexityAnalyzer::new(build_oracle(config, offline), &config.analyzer);
    let task = args.to_task();
    let context = args.to_context();

    let analysis = analyzer.analyze(&task, context.as_ref()).await;
    output(&AnalysisOutput { analysis }, json);
    Ok(())
}
