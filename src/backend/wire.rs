//! JSON bodies exchanged with the reader server.

use serde::{Deserialize, Serialize};

/// `GET /files`
#[derive(Debug, Deserialize)]
pub struct FilesResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

/// `POST /upload`: either `filename` or `error` is set.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// `DELETE /delete/{name}`
#[derive(Debug, Deserialize)]
pub struct DeleteResponse {
    pub error: Option<String>,
}

/// One heading as returned by outline extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub level: String,
    pub text: String,
    pub page: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutlineData {
    #[serde(default)]
    pub outline: Vec<OutlineItem>,
}

/// `GET /api/v1/extract-outline/`
#[derive(Debug, Deserialize)]
pub struct OutlineResponse {
    #[serde(default)]
    pub data: OutlineData,
}

/// Status values reported by the indexing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// `true` once the job can no longer change by itself.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// `GET /relevant/train/status`
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
}

/// One passage returned by semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub page: u32,
    pub paragraph_with_context: String,
    pub score: f32,
}

/// `GET /relevant/search`
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// Binary audio returned by speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_parses_lowercase() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(parsed.status, JobStatus::Running);
        assert!(!parsed.status.is_terminal());

        let parsed: StatusResponse = serde_json::from_str(r#"{"status":"done"}"#).unwrap();
        assert!(parsed.status.is_terminal());
    }

    #[test]
    fn upload_response_carries_error() {
        let parsed: UploadResponse =
            serde_json::from_str(r#"{"error":"File exists"}"#).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("File exists"));
        assert!(parsed.filename.is_none());
    }

    #[test]
    fn outline_response_tolerates_missing_outline() {
        let parsed: OutlineResponse =
            serde_json::from_str(r#"{"message":"ok","data":{"title":"x"}}"#).unwrap();
        assert!(parsed.data.outline.is_empty());
    }

    #[test]
    fn search_hit_matches_server_shape() {
        let body = r#"{"results":[{"doc_id":"a.pdf","page":3,
            "paragraph_with_context":"para","score":0.8}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].doc_id, "a.pdf");
        assert_eq!(parsed.results[0].page, 3);
    }
}
