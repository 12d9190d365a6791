//! `HttpBackend`: [`Backend`] over the reader server's REST API.
//!
//! All connection details come from [`BackendConfig`]; paths mirror the
//! server routes:
//!
//! | Operation          | Route                                   |
//! |--------------------|-----------------------------------------|
//! | list documents     | `GET    /files`                         |
//! | upload             | `POST   /upload` (multipart `file`)     |
//! | delete             | `DELETE /delete/{name}`                 |
//! | outline            | `GET    /api/v1/extract-outline/`       |
//! | start training     | `POST   /relevant/train`                |
//! | training status    | `GET    /relevant/train/status`         |
//! | search             | `GET    /relevant/search`               |
//! | generate           | `POST   /v1/llm/generate`               |
//! | synthesise audio   | `POST   /v1/audio/`                     |

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Url;

use crate::config::BackendConfig;
use crate::insight::InsightData;

use super::wire::{
    AudioPayload, DeleteResponse, FilesResponse, JobStatus, OutlineItem, OutlineResponse,
    SearchHit, SearchResponse, StatusResponse, UploadResponse,
};
use super::{Backend, BackendError};

/// MIME type assumed when the TTS endpoint omits `Content-Type`.
const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";

pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Build an `HttpBackend` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    ///
    /// A trailing `""` segment yields a trailing slash.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| BackendError::Request(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Request("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_documents(&self) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&["files"])?;
        let body: FilesResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.files)
    }

    async fn upload_document(&self, name: &str, bytes: &[u8]) -> Result<String, BackendError> {
        let url = self.endpoint(&["upload"])?;
        let part = Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let body: UploadResponse = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(reason) = body.error {
            return Err(BackendError::Rejected(reason));
        }
        Ok(body.filename.unwrap_or_else(|| name.to_string()))
    }

    async fn delete_document(&self, name: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["delete", name])?;
        let body: DeleteResponse = self
            .client
            .delete(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match body.error {
            Some(reason) => Err(BackendError::Rejected(reason)),
            None => Ok(()),
        }
    }

    async fn extract_outline(&self, name: &str) -> Result<Vec<OutlineItem>, BackendError> {
        let url = self.endpoint(&["api", "v1", "extract-outline", ""])?;
        let body: OutlineResponse = self
            .client
            .get(url)
            .query(&[("file_name", name)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.data.outline)
    }

    async fn start_training(&self) -> Result<(), BackendError> {
        let url = self.endpoint(&["relevant", "train"])?;
        self.client.post(url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn training_status(&self) -> Result<JobStatus, BackendError> {
        let url = self.endpoint(&["relevant", "train", "status"])?;
        let body: StatusResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.status)
    }

    async fn search_relevant(
        &self,
        query: &str,
        k: usize,
        context: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let url = self.endpoint(&["relevant", "search"])?;
        let k = k.to_string();
        let context = context.to_string();
        let body: SearchResponse = self
            .client
            .get(url)
            .query(&[("query", query), ("k", &k), ("context", &context)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.results)
    }

    async fn generate_text(&self, prompt: &str) -> Result<serde_json::Value, BackendError> {
        let url = self.endpoint(&["v1", "llm", "generate"])?;
        let body = serde_json::json!({ "prompt": prompt });
        let json = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(json)
    }

    async fn synthesize_audio(&self, insight: &InsightData) -> Result<AudioPayload, BackendError> {
        let url = self.endpoint(&["v1", "audio", ""])?;
        let body = serde_json::json!({ "text": insight });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_MIME)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(AudioPayload { bytes, mime })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
