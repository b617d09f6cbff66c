//! Stage executor
//!
//! Runs one external processing stage to completion and reports success
//! or failure uniformly, knowing nothing about the tool beyond its
//! invocation descriptor. A non-zero exit is fatal to the enclosing job;
//! there are no retries. No timeout or cancellation is propagated into a
//! running invocation, so a hung tool blocks only its owning job's task.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use vidiolingua_common::{PipelineError, Result};

/// Invocation descriptor for one external stage tool
#[derive(Debug, Clone)]
pub struct StageCommand {
    /// Program to execute (interpreter or binary)
    pub program: String,
    /// Arguments, typically the tool script path
    pub args: Vec<String>,
    /// Working directory for the invocation
    pub current_dir: PathBuf,
    /// Extra environment passed on top of the inherited one
    pub envs: Vec<(String, String)>,
}

impl StageCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, current_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir,
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Run a stage to completion. On failure the cause is the tool's trimmed
/// stderr, falling back to stdout, falling back to a generic exit-code
/// message.
pub async fn run_stage(stage: &str, command: &StageCommand) -> Result<()> {
    debug!(stage, program = %command.program, args = ?command.args, "invoking stage tool");

    let output = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.current_dir)
        .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PipelineError::StageFailed {
            stage: stage.to_string(),
            cause: format!("failed to start {}: {e}", command.program),
        })?;

    if output.status.success() {
        info!(stage, "stage completed");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let diagnostic = stderr.trim();
    let cause = if diagnostic.is_empty() {
        let fallback = stdout.trim();
        if fallback.is_empty() {
            match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            fallback.to_string()
        }
    } else {
        diagnostic.to_string()
    };

    Err(PipelineError::StageFailed {
        stage: stage.to_string(),
        cause,
    })
}
