//! Common types and utilities for the dubbing pipeline
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: {cause}")]
    StageFailed { stage: String, cause: String },

    #[error("job already exists: {0}")]
    DuplicateJob(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Per-job metrics, merged key-wise across stage updates
pub type Metrics = HashMap<String, serde_json::Value>;

/// Target languages the pipeline can dub into
pub const SUPPORTED_LANGUAGES: [&str; 3] = ["hi", "es", "fr"];

/// Human-readable name for a language code; falls back to the raw code
/// for anything outside the supported set.
#[must_use]
pub fn display_name(code: &str) -> &str {
    match code {
        "hi" => "Hindi",
        "es" => "Spanish",
        "fr" => "French",
        other => other,
    }
}

/// Map a display name back to its language code, if it is one we know.
fn code_for(raw: &str) -> Option<&'static str> {
    match raw {
        "Hindi" | "hi" => Some("hi"),
        "Spanish" | "es" => Some("es"),
        "French" | "fr" => Some("fr"),
        _ => None,
    }
}

/// Normalize a requested target-language list: names become codes,
/// unrecognized entries are dropped, duplicates collapse, and an empty
/// result falls back to the full supported set.
#[must_use]
pub fn normalize_languages<I, S>(requested: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut codes = Vec::with_capacity(SUPPORTED_LANGUAGES.len());
    for raw in requested {
        if let Some(code) = code_for(raw.as_ref()) {
            if !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
        }
    }
    if codes.is_empty() {
        codes = SUPPORTED_LANGUAGES.iter().map(ToString::to_string).collect();
    }
    codes
}

/// A single dubbed output in a job result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalizedVideo {
    /// Display name of the target language (raw code if unmapped)
    pub language: String,
    /// Download URL for the dubbed media
    pub url: String,
    /// Confidence score for this output
    pub confidence: f64,
}

/// Aggregate metrics attached to a terminal result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetrics {
    /// End-to-end pipeline wall time in seconds
    pub total_time: u64,
    /// Number of per-language outputs produced
    pub languages_processed: usize,
}

/// Terminal payload for a job, set at most once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    /// Job identifier
    pub job_id: String,
    /// URL of the original uploaded media
    pub original_video: String,
    /// One entry per produced target language
    pub localized_videos: Vec<LocalizedVideo>,
    /// Aggregate result metrics
    pub metrics: ResultMetrics,
    /// Diagnostic for errors and soft failures (zero usable outputs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultPayload {
    /// Synthesized payload for a job that terminated with a stage error.
    #[must_use]
    pub fn for_error(job_id: &str, error: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            original_video: String::new(),
            localized_videos: Vec::new(),
            metrics: ResultMetrics {
                total_time: 0,
                languages_processed: 0,
            },
            error: Some(error.to_string()),
        }
    }
}
