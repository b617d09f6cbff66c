//! Pipeline configuration, derived from the environment with defaults

use std::path::PathBuf;

use crate::stages::StageKind;

/// Runtime configuration for the pipeline runner
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which per-job workspaces are created
    pub jobs_root: PathBuf,
    /// Root containing the stage tool directories (`asr/`, `translation/`, ...)
    pub tools_root: PathBuf,
    /// Interpreter the tool scripts are run with
    pub interpreter: String,
    /// Base URL embedded in result download links
    pub api_base: String,
}

impl PipelineConfig {
    /// Read configuration from the environment, falling back to the
    /// defaults the original deployment used.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            jobs_root: std::env::var_os("JOBS_DIR")
                .map_or_else(|| PathBuf::from("jobs"), PathBuf::from),
            tools_root: std::env::var_os("VIDIOLINGUA_TOOLS_DIR")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            interpreter: std::env::var("VIDIOLINGUA_INTERPRETER")
                .or_else(|_| std::env::var("PYTHON"))
                .unwrap_or_else(|_| "python".to_string()),
            api_base: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        }
    }

    /// Path of a stage's tool script
    #[must_use]
    pub fn stage_script(&self, stage: StageKind) -> PathBuf {
        self.tools_root.join(stage.name()).join(stage.script_name())
    }
}
