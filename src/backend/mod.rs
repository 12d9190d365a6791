//! Backend collaborators consumed by the orchestration layer.
//!
//! This module provides:
//! * [`Backend`]: async trait covering every remote operation the reader
//!   depends on (inventory, upload, outline, training, search, LLM, TTS).
//! * [`HttpBackend`]: `reqwest` implementation speaking the reader server's
//!   REST paths.
//! * [`BackendError`]: error variants shared by all implementations.
//! * Wire types in [`wire`] mirroring the JSON bodies on the network.

pub mod http;
pub mod wire;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::insight::InsightData;

pub use http::HttpBackend;
pub use wire::{AudioPayload, JobStatus, OutlineItem, SearchHit};

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to a backend collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("backend request timed out")]
    Timeout,

    /// The server answered with a non-success status code.
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The response body could not be decoded as the expected JSON.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The server answered with an explicit `{ "error": … }` body.
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if let Some(status) = e.status() {
            BackendError::Status(status.as_u16())
        } else if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Remote services behind the reader.
///
/// Implementors must be `Send + Sync` so one instance can be shared by every
/// orchestrator as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Names of every document already stored on the server.
    async fn list_documents(&self) -> Result<Vec<String>, BackendError>;

    /// Store `bytes` under `name`; returns the name the server kept.
    async fn upload_document(&self, name: &str, bytes: &[u8]) -> Result<String, BackendError>;

    /// Remove the document called `name`.
    async fn delete_document(&self, name: &str) -> Result<(), BackendError>;

    /// Heading outline of a stored document.
    async fn extract_outline(&self, name: &str) -> Result<Vec<OutlineItem>, BackendError>;

    /// Kick off (re)indexing of every stored document.
    async fn start_training(&self) -> Result<(), BackendError>;

    /// Current status of the indexing job.
    async fn training_status(&self) -> Result<JobStatus, BackendError>;

    /// Semantic search over the indexed corpus.
    async fn search_relevant(
        &self,
        query: &str,
        k: usize,
        context: usize,
    ) -> Result<Vec<SearchHit>, BackendError>;

    /// Raw LLM response for `prompt`, left untyped on purpose; see
    /// [`crate::insight::parse`] for how it is validated.
    async fn generate_text(&self, prompt: &str) -> Result<serde_json::Value, BackendError>;

    /// Spoken rendition of an insight payload.
    async fn synthesize_audio(&self, insight: &InsightData) -> Result<AudioPayload, BackendError>;
}
