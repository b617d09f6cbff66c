//! Dubbing pipeline orchestrator
//!
//! Drives one job through the fixed stage sequence (ASR, translation,
//! TTS, lipsync), updating the job registry after each stage and
//! converting any stage failure into a terminal error state. Jobs run on
//! their own spawned task; the submitting caller never waits. Jobs are
//! fully independent: each one stages its artifacts inside its own
//! workspace, so concurrent pipelines never contend on a directory.

mod config;
mod result;
mod stages;

pub use config::PipelineConfig;
pub use result::{assemble_result, result_file_url, scan_localized_videos};
pub use stages::StageKind;

use std::fs;
use std::path::Path;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use vidiolingua_common::{Metrics, Result};
use vidiolingua_registry::{Job, JobRegistry, JobStage, JobUpdate};
use vidiolingua_stage_runner::{run_stage, StageCommand};
use vidiolingua_workspace::{forward, JobWorkspace};

/// Fallback message for a failure that produced no diagnostic text
const GENERIC_FAILURE: &str = "Pipeline failed (see server logs).";

/// Runs dubbing pipelines against a shared job registry
#[derive(Clone)]
pub struct PipelineRunner {
    registry: JobRegistry,
    config: PipelineConfig,
}

impl PipelineRunner {
    #[must_use]
    pub fn new(registry: JobRegistry, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Launch the pipeline for a created job on its own task and return
    /// immediately. Any fault inside the run is caught here, normalized
    /// into a non-empty cause and written once through the registry's
    /// error path.
    pub fn dispatch(&self, job_id: &str) -> JoinHandle<()> {
        let runner = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            let Some(job) = runner.registry.get(&job_id) else {
                warn!(job_id, "dispatch for unknown job");
                return;
            };
            if let Err(e) = runner.run_job(&job).await {
                let mut cause = e.to_string();
                if cause.trim().is_empty() {
                    cause = GENERIC_FAILURE.to_string();
                }
                error!(job_id, %cause, "pipeline failed");
                // Historical behavior: progress resets to 0 on error.
                runner.registry.update(
                    &job_id,
                    JobUpdate {
                        error: Some(cause),
                        progress: Some(0),
                        ..JobUpdate::default()
                    },
                );
            }
        })
    }

    /// Execute every stage in order for one job, then assemble and store
    /// the terminal result. Errors propagate to `dispatch`.
    async fn run_job(&self, job: &Job) -> Result<()> {
        let start = Instant::now();
        info!(job_id = %job.id, languages = ?job.languages, "pipeline started");

        let workspace = JobWorkspace::open(job.workspace.clone());
        let results_dir = workspace.results_dir();
        fs::create_dir_all(&results_dir)?;

        // Make the original media downloadable alongside the outputs.
        if let Err(e) = fs::copy(&job.video_path, results_dir.join(vidiolingua_workspace::UPLOAD_FILE_NAME)) {
            warn!(job_id = %job.id, "could not copy upload into results: {e}");
        }

        let mut prev_output: Option<std::path::PathBuf> = None;
        for stage in StageKind::ORDER {
            self.registry.update(
                &job.id,
                JobUpdate::stage_progress(stage.registry_stage(), stage.enter_progress()),
            );

            let (input, output) = workspace.prepare_stage(stage.name())?;
            match &prev_output {
                // First stage consumes the original upload.
                None => {
                    fs::copy(&job.video_path, input.join(upload_name(&job.video_path)))?;
                }
                Some(prev) => {
                    forward(prev, &input)?;
                }
            }
            if stage == StageKind::Lipsync {
                // The recombination tool needs the original video next to
                // the synthesized audio.
                fs::copy(&job.video_path, input.join(upload_name(&job.video_path)))?;
            }

            let command = self.stage_command(stage, job, &input, &output);
            run_stage(stage.title(), &command).await?;

            if stage == StageKind::Asr {
                self.record_source_language(&job.id, &output);
            }

            let (key, value) = stage.completion_metric();
            let mut metrics = Metrics::new();
            metrics.insert(key.to_string(), value);
            self.registry.update(
                &job.id,
                JobUpdate {
                    progress: Some(stage.done_progress()),
                    metrics: Some(metrics),
                    ..JobUpdate::default()
                },
            );
            prev_output = Some(output);
        }

        if let Some(final_output) = &prev_output {
            forward(final_output, &results_dir)?;
        }

        let localized =
            scan_localized_videos(&results_dir, &self.config.api_base, &job.id)?;
        let produced = localized.len();
        let payload = assemble_result(
            &job.id,
            &self.config.api_base,
            localized,
            start.elapsed().as_secs(),
        );
        self.registry.update(
            &job.id,
            JobUpdate {
                stage: Some(JobStage::Complete),
                progress: Some(100),
                result: Some(payload),
                ..JobUpdate::default()
            },
        );
        info!(job_id = %job.id, produced, "pipeline complete");
        Ok(())
    }

    /// Build the invocation for one stage: interpreter + tool script,
    /// designated input/output directories and stage-specific environment.
    fn stage_command(
        &self,
        stage: StageKind,
        job: &Job,
        input: &Path,
        output: &Path,
    ) -> StageCommand {
        let mut command = StageCommand::new(
            self.config.interpreter.clone(),
            self.config.tools_root.clone(),
        )
        .arg(self.config.stage_script(stage).to_string_lossy().into_owned())
        .env("VIDIOLINGUA_INPUT_DIR", input.to_string_lossy().into_owned())
        .env("VIDIOLINGUA_OUTPUT_DIR", output.to_string_lossy().into_owned());

        match stage {
            StageKind::Asr => {
                if let Some(lang) = &job.source_language {
                    command = command.env("VIDIOLINGUA_SOURCE_LANGUAGE", lang.clone());
                }
            }
            StageKind::Translation => {
                command = command
                    .env("VIDIOLINGUA_TARGET_LANGUAGES", job.languages.join(","));
            }
            StageKind::Tts => {
                command = command.env(
                    "VIDIOLINGUA_VOICE_OPTIONS",
                    job.voice_options.to_string(),
                );
                if let Some(sample) = &job.voice_sample_path {
                    command = command
                        .env("VIDIOLINGUA_VOICE_SAMPLE", sample.to_string_lossy().into_owned());
                }
            }
            StageKind::Lipsync => {}
        }
        command
    }

    /// Read the detected source language out of the ASR transcription
    /// artifact, if the tool reported one. Best-effort: anything missing
    /// or unparseable is skipped.
    fn record_source_language(&self, job_id: &str, asr_output: &Path) {
        let Some(value) = read_transcription(asr_output) else {
            return;
        };
        let language = value
            .get("language")
            .and_then(|v| v.as_str())
            .map(ToString::to_string);
        let confidence = value.get("language_probability").and_then(serde_json::Value::as_f64);
        if language.is_none() && confidence.is_none() {
            return;
        }
        info!(job_id, ?language, ?confidence, "detected source language");
        self.registry.update(
            job_id,
            JobUpdate {
                source_language: language,
                source_language_confidence: confidence,
                ..JobUpdate::default()
            },
        );
    }
}

/// Find and parse the first `*_transcription.json` in a directory
fn read_transcription(dir: &Path) -> Option<serde_json::Value> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with("_transcription.json") {
            let text = fs::read_to_string(entry.path()).ok()?;
            return serde_json::from_str(&text).ok();
        }
    }
    None
}

/// File name component of the uploaded media path
fn upload_name(video_path: &Path) -> std::ffi::OsString {
    video_path
        .file_name()
        .map_or_else(|| std::ffi::OsString::from(vidiolingua_workspace::UPLOAD_FILE_NAME), ToOwned::to_owned)
}
