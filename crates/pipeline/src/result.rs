//! Terminal result assembly
//!
//! Scans a job's final output directory for per-language dubbed
//! artifacts (`<stem>_dubbed_<lang>.mp4`) and builds the result payload.

use std::path::Path;

use vidiolingua_common::{
    display_name, LocalizedVideo, Result, ResultMetrics, ResultPayload,
};
use vidiolingua_workspace::UPLOAD_FILE_NAME;

/// Marker embedded in the stem of every dubbed artifact
const DUBBED_MARKER: &str = "_dubbed_";

/// Confidence reported for dubbed outputs
const OUTPUT_CONFIDENCE: f64 = 0.88;

/// Guidance returned when a run completes without producing any output
const NO_OUTPUT_GUIDANCE: &str = "No dubbed videos were produced. \
    Ensure ffmpeg is installed and on PATH, and that the stage tools are \
    set up. Check the server logs for stage errors.";

/// Download URL for a file in a job's results directory
#[must_use]
pub fn result_file_url(api_base: &str, job_id: &str, file_name: &str) -> String {
    format!("{api_base}/api/result/{job_id}/file/{file_name}")
}

/// Collect one entry per recognized dubbed artifact in `results_dir`.
/// The language code is whatever follows the last `_dubbed_` in the stem;
/// unmapped codes keep the raw code as display name.
pub fn scan_localized_videos(
    results_dir: &Path,
    api_base: &str,
    job_id: &str,
) -> Result<Vec<LocalizedVideo>> {
    let mut videos = Vec::new();
    if !results_dir.exists() {
        return Ok(videos);
    }
    for entry in std::fs::read_dir(results_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_mp4 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if !is_mp4 {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(idx) = stem.rfind(DUBBED_MARKER) else {
            continue;
        };
        let lang_code = &stem[idx + DUBBED_MARKER.len()..];
        let file_name = entry.file_name().to_string_lossy().into_owned();
        videos.push(LocalizedVideo {
            language: display_name(lang_code).to_string(),
            url: result_file_url(api_base, job_id, &file_name),
            confidence: OUTPUT_CONFIDENCE,
        });
    }
    // Stable order for pollers regardless of directory iteration order
    videos.sort_by(|a, b| a.language.cmp(&b.language));
    Ok(videos)
}

/// Build the terminal payload for a finished run. Zero localized videos
/// is a soft failure: the job still completes, but the payload carries a
/// diagnostic and an empty output list.
#[must_use]
pub fn assemble_result(
    job_id: &str,
    api_base: &str,
    localized: Vec<LocalizedVideo>,
    total_time: u64,
) -> ResultPayload {
    let error = if localized.is_empty() {
        Some(NO_OUTPUT_GUIDANCE.to_string())
    } else {
        None
    };
    ResultPayload {
        job_id: job_id.to_string(),
        original_video: result_file_url(api_base, job_id, UPLOAD_FILE_NAME),
        metrics: ResultMetrics {
            total_time,
            languages_processed: localized.len(),
        },
        localized_videos: localized,
        error,
    }
}
