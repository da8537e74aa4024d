//! Oracle backed by a local command.
//!
//! The configured program is run with its configured arguments followed by
//! the prompt; stdout is the reply. Which model or provider sits behind the
//! command is not this crate's concern.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::OracleConfig;
use crate::domain::ports::ComplexityOracle;

pub struct CommandOracle {
    command: String,
    args: Vec<String>,
    working_dir: Option<String>,
}

impl CommandOracle {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
        }
    }
}

#[async_trait]
impl ComplexityOracle for CommandOracle {
    fn name(&self) -> &str {
        &self.command
    }

    async fn complete(&self, prompt: &str) -> DomainResult<String> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Callers bound the wait by dropping this future
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %self.command, prompt_len = prompt.len(), "Querying oracle command");

        let output = cmd.output().await.map_err(|e| {
            DomainError::OracleUnavailable(format!("failed to execute {}: {e}", self.command))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::OracleUnavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
