//! In-memory job registry for dubbing pipeline jobs
//!
//! Maps job id -> stage, progress, metrics, result. The registry is the
//! only component that mutates job state; the orchestrator and the HTTP
//! handlers go through its synchronized API and never hold a reference
//! into registry-internal storage. Volatile by design: jobs live for the
//! lifetime of the process and there is no deletion API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vidiolingua_common::{Metrics, PipelineError, Result, ResultPayload};

/// Lifecycle stage of a job. Transitions only move forward through the
/// pipeline order, or jump to `Error` from any non-terminal stage;
/// `Complete` and `Error` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    /// Upload accepted, pipeline not yet started
    Uploading,
    /// Speech recognition
    Asr,
    /// Machine translation
    Translation,
    /// Speech synthesis
    Tts,
    /// Audio/video recombination
    Lipsync,
    /// Pipeline finished (possibly a soft failure, see result payload)
    Complete,
    /// A stage failed; see the error field
    Error,
}

impl JobStage {
    /// Position in the forward ordering. `Error` sits past `Complete` so
    /// the forward-only guard never re-enters a pipeline stage from it.
    fn index(self) -> u8 {
        match self {
            Self::Uploading => 0,
            Self::Asr => 1,
            Self::Translation => 2,
            Self::Tts => 3,
            Self::Lipsync => 4,
            Self::Complete => 5,
            Self::Error => 6,
        }
    }

    /// Whether this stage is absorbing
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Stage name as it appears on the wire
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Asr => "asr",
            Self::Translation => "translation",
            Self::Tts => "tts",
            Self::Lipsync => "lipsync",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// A single job record
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub stage: JobStage,
    pub progress: u8,
    pub current_language: Option<String>,
    pub languages: Vec<String>,
    pub source_language: Option<String>,
    pub source_language_confidence: Option<f64>,
    pub voice_options: serde_json::Value,
    pub voice_sample_path: Option<PathBuf>,
    pub error: Option<String>,
    pub metrics: Metrics,
    pub video_path: PathBuf,
    pub workspace: PathBuf,
    pub result: Option<ResultPayload>,
}

/// Fields required to create a job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub video_path: PathBuf,
    pub workspace: PathBuf,
    pub languages: Vec<String>,
    pub source_language: Option<String>,
    pub voice_options: serde_json::Value,
    pub voice_sample_path: Option<PathBuf>,
}

/// Partial update applied atomically to a job. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub stage: Option<JobStage>,
    /// Clamped into [0, 100] on apply
    pub progress: Option<i64>,
    pub current_language: Option<String>,
    pub source_language: Option<String>,
    pub source_language_confidence: Option<f64>,
    /// Setting an error also forces the stage to `Error`
    pub error: Option<String>,
    /// Merged key-wise into the existing metrics map
    pub metrics: Option<Metrics>,
    pub voice_options: Option<serde_json::Value>,
    pub voice_sample_path: Option<PathBuf>,
    /// Ignored if the job already has a result
    pub result: Option<ResultPayload>,
}

impl JobUpdate {
    /// Shorthand for a stage + progress advance
    #[must_use]
    pub fn stage_progress(stage: JobStage, progress: i64) -> Self {
        Self {
            stage: Some(stage),
            progress: Some(progress),
            ..Self::default()
        }
    }
}

/// Poller-facing status view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub stage: JobStage,
    pub progress: u8,
    pub current_language: Option<String>,
    pub languages: Vec<String>,
    pub source_language: Option<String>,
    pub source_language_confidence: Option<f64>,
    pub error: Option<String>,
    pub metrics: Metrics,
}

/// Outcome of a result lookup. `Pending` (job exists, not terminal) is
/// distinct from `NotFound`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultView {
    NotFound,
    Pending,
    Ready(ResultPayload),
}

/// Concurrent job store. Cloning shares the underlying map; every
/// operation is atomic under a single lock.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
}

impl JobRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job in stage `Uploading`. Fails if the id is taken.
    pub fn create(&self, new_job: NewJob) -> Result<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(&new_job.id) {
            return Err(PipelineError::DuplicateJob(new_job.id));
        }
        let job = Job {
            id: new_job.id.clone(),
            stage: JobStage::Uploading,
            progress: 0,
            current_language: None,
            languages: new_job.languages,
            source_language: new_job.source_language,
            source_language_confidence: None,
            voice_options: new_job.voice_options,
            voice_sample_path: new_job.voice_sample_path,
            error: None,
            metrics: Metrics::new(),
            video_path: new_job.video_path,
            workspace: new_job.workspace,
            result: None,
        };
        jobs.insert(new_job.id, job);
        Ok(())
    }

    /// Apply a partial update. A missing id is a silent no-op, not an
    /// error: an update may race a slow creation path and dropping it is
    /// the defined behavior.
    pub fn update(&self, id: &str, update: JobUpdate) {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };

        if let Some(stage) = update.stage {
            // Terminal stages absorb; earlier stages are never re-entered.
            if !job.stage.is_terminal() && stage.index() > job.stage.index() {
                job.stage = stage;
            }
        }
        if let Some(progress) = update.progress {
            job.progress = progress.clamp(0, 100) as u8;
        }
        if let Some(lang) = update.current_language {
            job.current_language = Some(lang);
        }
        if let Some(lang) = update.source_language {
            job.source_language = Some(lang);
        }
        if let Some(conf) = update.source_language_confidence {
            job.source_language_confidence = Some(conf);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
            if !job.stage.is_terminal() {
                job.stage = JobStage::Error;
            }
        }
        if let Some(metrics) = update.metrics {
            job.metrics.extend(metrics);
        }
        if let Some(options) = update.voice_options {
            job.voice_options = options;
        }
        if let Some(path) = update.voice_sample_path {
            job.voice_sample_path = Some(path);
        }
        if let Some(result) = update.result {
            if job.result.is_none() {
                job.result = Some(result);
            }
        }
    }

    /// Clone out a full job record
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    /// Poller status view, or `None` for an unknown id
    #[must_use]
    pub fn status_view(&self, id: &str) -> Option<JobStatus> {
        let jobs = self.lock();
        jobs.get(id).map(|job| JobStatus {
            job_id: job.id.clone(),
            stage: job.stage,
            progress: job.progress,
            current_language: job.current_language.clone(),
            languages: job.languages.clone(),
            source_language: job.source_language.clone(),
            source_language_confidence: job.source_language_confidence,
            error: job.error.clone(),
            metrics: job.metrics.clone(),
        })
    }

    /// Result view. Synthesizes an error payload for a failed job with no
    /// explicit result, so result retrieval never blocks on failure.
    #[must_use]
    pub fn result_view(&self, id: &str) -> ResultView {
        let jobs = self.lock();
        let Some(job) = jobs.get(id) else {
            return ResultView::NotFound;
        };
        if let Some(result) = &job.result {
            return ResultView::Ready(result.clone());
        }
        if job.stage == JobStage::Error {
            let cause = job.error.as_deref().unwrap_or("Pipeline failed.");
            return ResultView::Ready(ResultPayload::for_error(&job.id, cause));
        }
        ResultView::Pending
    }

    /// Number of known jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry holds no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Job>> {
        // A poisoned lock means a panic while holding it; the map itself
        // is never left mid-update since each update is applied in full.
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(id: &str) -> NewJob {
        NewJob {
            id: id.to_string(),
            video_path: PathBuf::from("/tmp/jobs/j/input_video.mp4"),
            workspace: PathBuf::from("/tmp/jobs/j"),
            languages: vec!["es".to_string(), "fr".to_string()],
            source_language: None,
            voice_options: serde_json::json!({}),
            voice_sample_path: None,
        }
    }

    #[test]
    fn test_create_initial_state() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();

        let job = registry.get("j1").unwrap();
        assert_eq!(job.stage, JobStage::Uploading);
        assert_eq!(job.progress, 0);
        assert!(job.error.is_none());
        assert!(job.result.is_none());
        assert!(job.metrics.is_empty());
    }

    #[test]
    fn test_create_duplicate_fails_without_corruption() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update(
            "j1",
            JobUpdate::stage_progress(JobStage::Asr, 10),
        );

        let err = registry.create(new_job("j1")).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateJob(id) if id == "j1"));

        // Existing record untouched
        let job = registry.get("j1").unwrap();
        assert_eq!(job.stage, JobStage::Asr);
        assert_eq!(job.progress, 10);
    }

    #[test]
    fn test_two_jobs_independent() {
        let registry = JobRegistry::new();
        registry.create(new_job("a")).unwrap();
        registry.create(new_job("b")).unwrap();

        registry.update("a", JobUpdate::stage_progress(JobStage::Asr, 10));
        assert_eq!(registry.get("a").unwrap().stage, JobStage::Asr);
        assert_eq!(registry.get("b").unwrap().stage, JobStage::Uploading);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();

        registry.update("ghost", JobUpdate::stage_progress(JobStage::Asr, 50));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("ghost").is_none());
        assert_eq!(registry.get("j1").unwrap().stage, JobStage::Uploading);
    }

    #[test]
    fn test_progress_clamped() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();

        registry.update(
            "j1",
            JobUpdate {
                progress: Some(150),
                ..JobUpdate::default()
            },
        );
        assert_eq!(registry.get("j1").unwrap().progress, 100);

        registry.update(
            "j1",
            JobUpdate {
                progress: Some(-5),
                ..JobUpdate::default()
            },
        );
        assert_eq!(registry.get("j1").unwrap().progress, 0);
    }

    #[test]
    fn test_error_forces_error_stage() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update("j1", JobUpdate::stage_progress(JobStage::Translation, 35));

        registry.update(
            "j1",
            JobUpdate {
                error: Some("Translation: exit code 1".to_string()),
                progress: Some(0),
                ..JobUpdate::default()
            },
        );

        let job = registry.get("j1").unwrap();
        assert_eq!(job.stage, JobStage::Error);
        assert_eq!(job.progress, 0);
        assert_eq!(job.error.as_deref(), Some("Translation: exit code 1"));
    }

    #[test]
    fn test_stage_never_moves_backward() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update("j1", JobUpdate::stage_progress(JobStage::Tts, 60));

        registry.update(
            "j1",
            JobUpdate {
                stage: Some(JobStage::Asr),
                ..JobUpdate::default()
            },
        );
        assert_eq!(registry.get("j1").unwrap().stage, JobStage::Tts);
    }

    #[test]
    fn test_terminal_stage_is_absorbing() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update(
            "j1",
            JobUpdate {
                error: Some("ASR: boom".to_string()),
                ..JobUpdate::default()
            },
        );

        // Later updates may still merge fields but never revert the stage.
        let mut metrics = Metrics::new();
        metrics.insert("wer".to_string(), serde_json::json!(0.08));
        registry.update(
            "j1",
            JobUpdate {
                stage: Some(JobStage::Translation),
                metrics: Some(metrics),
                ..JobUpdate::default()
            },
        );

        let job = registry.get("j1").unwrap();
        assert_eq!(job.stage, JobStage::Error);
        assert_eq!(job.metrics.get("wer"), Some(&serde_json::json!(0.08)));
    }

    #[test]
    fn test_metrics_merge_key_wise() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();

        let mut first = Metrics::new();
        first.insert("wer".to_string(), serde_json::json!(0.08));
        registry.update(
            "j1",
            JobUpdate {
                metrics: Some(first),
                ..JobUpdate::default()
            },
        );

        let mut second = Metrics::new();
        second.insert("bleu".to_string(), serde_json::json!(0.82));
        registry.update(
            "j1",
            JobUpdate {
                metrics: Some(second),
                ..JobUpdate::default()
            },
        );

        let metrics = registry.get("j1").unwrap().metrics;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("wer"), Some(&serde_json::json!(0.08)));
        assert_eq!(metrics.get("bleu"), Some(&serde_json::json!(0.82)));
    }

    #[test]
    fn test_result_set_at_most_once() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();

        assert!(registry.get("j1").unwrap().result.is_none());

        let first = ResultPayload::for_error("j1", "first");
        registry.update(
            "j1",
            JobUpdate {
                result: Some(first.clone()),
                ..JobUpdate::default()
            },
        );
        registry.update(
            "j1",
            JobUpdate {
                result: Some(ResultPayload::for_error("j1", "second")),
                ..JobUpdate::default()
            },
        );

        assert_eq!(registry.get("j1").unwrap().result, Some(first));
    }

    #[test]
    fn test_result_view_states() {
        let registry = JobRegistry::new();
        assert_eq!(registry.result_view("ghost"), ResultView::NotFound);

        registry.create(new_job("j1")).unwrap();
        assert_eq!(registry.result_view("j1"), ResultView::Pending);

        registry.update("j1", JobUpdate::stage_progress(JobStage::Asr, 10));
        assert_eq!(registry.result_view("j1"), ResultView::Pending);
    }

    #[test]
    fn test_result_view_synthesizes_error_payload() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update(
            "j1",
            JobUpdate {
                error: Some("TTS: exit code 2".to_string()),
                progress: Some(0),
                ..JobUpdate::default()
            },
        );

        match registry.result_view("j1") {
            ResultView::Ready(payload) => {
                assert_eq!(payload.job_id, "j1");
                assert!(payload.localized_videos.is_empty());
                assert_eq!(payload.metrics.languages_processed, 0);
                assert_eq!(payload.error.as_deref(), Some("TTS: exit code 2"));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_status_view_wire_format() {
        let registry = JobRegistry::new();
        registry.create(new_job("j1")).unwrap();
        registry.update("j1", JobUpdate::stage_progress(JobStage::Lipsync, 85));

        let status = registry.status_view("j1").unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["stage"], "lipsync");
        assert_eq!(json["progress"], 85);
        assert_eq!(json["languages"], serde_json::json!(["es", "fr"]));

        assert!(registry.status_view("ghost").is_none());
    }

    #[test]
    fn test_concurrent_creates_and_updates() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let id = format!("job-{i}");
                let mut job = new_job(&id);
                job.id = id.clone();
                registry.create(job).unwrap();
                for p in 0..=100 {
                    registry.update(
                        &id,
                        JobUpdate {
                            progress: Some(p),
                            ..JobUpdate::default()
                        },
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        for i in 0..8 {
            assert_eq!(registry.get(&format!("job-{i}")).unwrap().progress, 100);
        }
    }
}
