//! Wire types for the HTTP surface
//!
//! Job status and result payloads are defined next to the registry; this
//! module only adds the types with no life outside a handler.

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response to a successful upload, acknowledged before the pipeline runs
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_wire_format() {
        let response = UploadResponse {
            job_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"jobId": "abc"}));
    }
}
