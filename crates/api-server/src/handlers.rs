//! HTTP request handlers for API endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{HealthResponse, UploadResponse};
use crate::ApiState;
use vidiolingua_common::normalize_languages;
use vidiolingua_registry::{NewJob, ResultView};
use vidiolingua_workspace::JobWorkspace;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Multipart fields collected from an upload request
#[derive(Default)]
struct UploadForm {
    video: Option<Vec<u8>>,
    languages: Option<String>,
    voice_options: Option<String>,
    source_language: Option<String>,
    voice_sample: Option<(String, Vec<u8>)>,
}

/// Accept a video upload, create a job and start the dubbing pipeline in
/// the background. Responds with the job id as soon as the upload is
/// staged; progress is observed through the status endpoint.
pub async fn upload(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let is_video = field
                    .content_type()
                    .is_some_and(|ct| ct.starts_with("video/"));
                if !is_video || field.file_name().unwrap_or_default().is_empty() {
                    return Err((
                        StatusCode::BAD_REQUEST,
                        "A video file is required".to_string(),
                    ));
                }
                let bytes = read_field(field).await?;
                form.video = Some(bytes);
            }
            "languages" => form.languages = Some(read_text_field(field).await?),
            "voiceOptions" => form.voice_options = Some(read_text_field(field).await?),
            "sourceLanguage" => form.source_language = Some(read_text_field(field).await?),
            "voiceSample" => {
                let file_name = field.file_name().unwrap_or("voice_sample.wav").to_string();
                let bytes = read_field(field).await?;
                form.voice_sample = Some((file_name, bytes));
            }
            other => warn!(field = other, "ignoring unknown upload field"),
        }
    }

    let Some(video_bytes) = form.video else {
        return Err((
            StatusCode::BAD_REQUEST,
            "A video file is required".to_string(),
        ));
    };

    let languages = parse_languages(form.languages.as_deref());
    let voice_options = parse_voice_options(form.voice_options.as_deref());
    let source_language = form
        .source_language
        .filter(|s| !s.trim().is_empty() && s != "auto");

    let job_id = Uuid::new_v4().to_string();
    info!(job_id, ?languages, "upload accepted");

    let workspace = JobWorkspace::create(&state.runner.config().jobs_root, &job_id)
        .map_err(internal_error)?;
    let video_path = workspace.upload_path();
    tokio::fs::write(&video_path, &video_bytes)
        .await
        .map_err(internal_error)?;

    let voice_sample_path = match form.voice_sample {
        Some((file_name, bytes)) => {
            let path = workspace.root().join(sample_file_name(&file_name));
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(internal_error)?;
            Some(path)
        }
        None => None,
    };

    state
        .registry
        .create(NewJob {
            id: job_id.clone(),
            video_path,
            workspace: workspace.root().to_path_buf(),
            languages,
            source_language,
            voice_options,
            voice_sample_path,
        })
        .map_err(internal_error)?;

    // Fire and forget: the task owns the job from here.
    state.runner.dispatch(&job_id);

    Ok(Json(UploadResponse { job_id }))
}

/// Get job status for polling
pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.registry.status_view(&job_id) {
        Some(status) => Ok(Json(status)),
        None => Err((StatusCode::NOT_FOUND, format!("Job not found: {job_id}"))),
    }
}

/// Get the job result once the job reaches a terminal stage. A job that
/// is still running answers 202 so pollers can tell "not yet" from
/// "never existed".
pub async fn job_result(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.registry.result_view(&job_id) {
        ResultView::Ready(payload) => Ok(Json(payload)),
        ResultView::Pending => Err((StatusCode::ACCEPTED, "Job not complete".to_string())),
        ResultView::NotFound => Err((StatusCode::NOT_FOUND, format!("Job not found: {job_id}"))),
    }
}

/// Serve one file from a job's results directory. Only bare file names
/// are accepted; anything that could escape the directory is rejected.
pub async fn result_file(
    State(state): State<ApiState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err((StatusCode::BAD_REQUEST, "Invalid filename".to_string()));
    }

    let workspace = JobWorkspace::open(state.runner.config().jobs_root.join(&job_id));
    let path = workspace.results_dir().join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return Err((StatusCode::NOT_FOUND, "File not found".to_string())),
    };

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes))
}

async fn read_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<Vec<u8>, (StatusCode, String)> {
    field
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<String, (StatusCode, String)> {
    field
        .text()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))
}

/// Parse the `languages` form field, a JSON array of codes or display
/// names. Unparseable input and unsupported entries fall back exactly
/// like an absent field: the full supported set.
fn parse_languages(raw: Option<&str>) -> Vec<String> {
    let requested: Vec<String> = raw
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    normalize_languages(requested)
}

/// Parse the `voiceOptions` form field, an opaque JSON object forwarded
/// to the TTS tool. Unparseable input degrades to an empty object.
fn parse_voice_options(raw: Option<&str>) -> serde_json::Value {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

/// Stable on-disk name for an uploaded voice sample, keeping only the
/// original extension
fn sample_file_name(uploaded: &str) -> String {
    let extension = std::path::Path::new(uploaded)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("wav");
    format!("voice_sample.{extension}")
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".json") {
        "application/json"
    } else if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else {
        "application/octet-stream"
    }
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
