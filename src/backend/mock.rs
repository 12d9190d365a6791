//! Scriptable in-memory [`Backend`] used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::insight::InsightData;

use super::wire::{AudioPayload, JobStatus, OutlineItem, SearchHit};
use super::{Backend, BackendError};

/// Marker the insight prompt wraps the selection in; the mock echoes it back.
const SELECTION_MARKER: &str = "selected the text: \"";

#[derive(Default)]
pub struct MockBackend {
    pub inventory: Mutex<Vec<String>>,
    pub outlines: Mutex<HashMap<String, Vec<OutlineItem>>>,
    pub outline_fails: AtomicBool,
    pub upload_rejection: Mutex<Option<String>>,
    pub delete_fails: AtomicBool,
    /// Number of upcoming `start_training` calls that fail.
    pub start_failures: AtomicUsize,
    /// Statuses returned by successive polls; `Done` once exhausted.
    pub statuses: Mutex<VecDeque<JobStatus>>,
    pub hits: Mutex<Vec<SearchHit>>,
    /// Extra latency applied to searches for a given query.
    pub search_delays: Mutex<HashMap<String, Duration>>,
    /// Number of upcoming `generate_text` calls that fail.
    pub generate_failures: AtomicUsize,
    /// Raw LLM payload returned instead of the default echo.
    pub generate_override: Mutex<Option<Value>>,
    pub audio_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        let mock = Self::default();
        *mock.hits.lock().unwrap() = hits;
        mock
    }

    /// How many times operation `op` was invoked.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    /// Gemini-shaped response whose text is a fenced insight object.
    pub fn llm_response(selected: &str) -> Value {
        let inner = json!({
            "text": {
                "selected_text": selected,
                "key_insights": format!("insight about {selected}"),
                "did_you_know": "",
                "counterpoints": "",
                "connecting_the_dots": ["first link", "second link"],
            }
        });
        json!({
            "candidates": [
                { "content": { "parts": [ { "text": format!("```json\n{inner}\n```") } ] } }
            ]
        })
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub fn hit(doc_id: &str, page: u32, score: f32) -> SearchHit {
    SearchHit {
        doc_id: doc_id.into(),
        page,
        paragraph_with_context: format!("{doc_id} paragraph on page {page}"),
        score,
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_documents(&self) -> Result<Vec<String>, BackendError> {
        self.record("list");
        Ok(self.inventory.lock().unwrap().clone())
    }

    async fn upload_document(&self, name: &str, _bytes: &[u8]) -> Result<String, BackendError> {
        self.record("upload");
        if let Some(reason) = self.upload_rejection.lock().unwrap().clone() {
            return Err(BackendError::Rejected(reason));
        }
        self.inventory.lock().unwrap().push(name.to_string());
        Ok(name.to_string())
    }

    async fn delete_document(&self, name: &str) -> Result<(), BackendError> {
        self.record("delete");
        if self.delete_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected("File not found".into()));
        }
        self.inventory.lock().unwrap().retain(|n| n != name);
        Ok(())
    }

    async fn extract_outline(&self, name: &str) -> Result<Vec<OutlineItem>, BackendError> {
        self.record("outline");
        if self.outline_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Status(500));
        }
        Ok(self
            .outlines
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn start_training(&self) -> Result<(), BackendError> {
        self.record("train");
        if Self::take_failure(&self.start_failures) {
            return Err(BackendError::Request("connection refused".into()));
        }
        Ok(())
    }

    async fn training_status(&self) -> Result<JobStatus, BackendError> {
        self.record("status");
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(JobStatus::Done))
    }

    async fn search_relevant(
        &self,
        query: &str,
        _k: usize,
        _context: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        self.record("search");
        let delay = self.search_delays.lock().unwrap().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn generate_text(&self, prompt: &str) -> Result<Value, BackendError> {
        self.record("generate");
        if Self::take_failure(&self.generate_failures) {
            return Err(BackendError::Status(503));
        }
        if let Some(payload) = self.generate_override.lock().unwrap().clone() {
            return Ok(payload);
        }
        let selected = prompt
            .split(SELECTION_MARKER)
            .nth(1)
            .and_then(|rest| rest.split("\".").next())
            .unwrap_or_default();
        Ok(Self::llm_response(selected))
    }

    async fn synthesize_audio(&self, insight: &InsightData) -> Result<AudioPayload, BackendError> {
        self.record("audio");
        let delay = *self.audio_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(AudioPayload {
            bytes: insight.key_insights.as_bytes().to_vec(),
            mime: "audio/mpeg".into(),
        })
    }
}
