//! Insight/Relevance orchestrator: selection → retrieval → synthesis.
//!
//! # Pipeline flow
//!
//! ```text
//! on_selection_changed(selection, training)
//!   ├─ different text than the running pipeline → cancel it
//!   ├─ training not Ready → cancel it, forget the displayed source
//!   └─ gate: active selection ∧ training Ready ∧ text ≠ displayed source
//!         └─▶ spawn pipeline                               [Pending]
//!               ├─ search_relevant(text, k, context)       → view.relevant
//!               ├─ generate_text(prompt)  (retry 1 s, 2 s)
//!               │     ├─ Ok  → parse::interpret            [Ready | Unavailable]
//!               │     └─ Err → give up                     [Empty]
//!               └─ every publish is checked against the pipeline generation
//! ```
//!
//! At most one pipeline runs at a time. Starting a new one, or selecting
//! different text, cancels the previous pipeline; anything it still tries to
//! publish is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::InsightConfig;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::selection::Selection;
use crate::training::TrainingState;

use super::data::InsightState;
use super::parse;
use super::prompt::build_insight_prompt;
use super::relevance::{rank, visible_relevant, RelevantResult};

// ---------------------------------------------------------------------------
// InsightView
// ---------------------------------------------------------------------------

/// Everything the insight and relevant-sections panels render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightView {
    /// Selection text that produced (or is producing) this view.
    pub source_text: Option<String>,
    /// Ranked passages from the last retrieval.
    pub relevant: Vec<RelevantResult>,
    pub insight: InsightState,
}

// ---------------------------------------------------------------------------
// Inflight
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inflight {
    generation: u64,
    text: Option<String>,
    cancel: Option<CancellationToken>,
}

fn lock_inflight(inflight: &Mutex<Inflight>) -> MutexGuard<'_, Inflight> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// InsightOrchestrator
// ---------------------------------------------------------------------------

pub struct InsightOrchestrator {
    backend: Arc<dyn Backend>,
    config: InsightConfig,
    view: Arc<watch::Sender<InsightView>>,
    inflight: Arc<Mutex<Inflight>>,
}

impl InsightOrchestrator {
    pub fn new(backend: Arc<dyn Backend>, config: InsightConfig) -> Self {
        let (view, _) = watch::channel(InsightView::default());
        Self {
            backend,
            config,
            view: Arc::new(view),
            inflight: Arc::new(Mutex::new(Inflight::default())),
        }
    }

    pub fn view(&self) -> InsightView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InsightView> {
        self.view.subscribe()
    }

    /// Relevant passages filtered for display while `active_doc` is open.
    pub fn visible_relevant(&self, active_doc: Option<&str>) -> Vec<RelevantResult> {
        let view = self.view.borrow();
        visible_relevant(
            &view.relevant,
            active_doc,
            self.config.min_score,
            self.config.max_per_document,
        )
        .into_iter()
        .cloned()
        .collect()
    }

    /// React to a selection or training-state change.
    ///
    /// Returns `true` when a new pipeline was started.
    pub fn on_selection_changed(&self, selection: &Selection, training: TrainingState) -> bool {
        let mut inflight = lock_inflight(&self.inflight);

        if inflight.cancel.is_some() && inflight.text.as_deref() != Some(selection.text.as_str()) {
            self.abandon(&mut inflight);
        }

        if !training.is_ready() {
            self.invalidate(&mut inflight);
            log::debug!("insight: index not ready ({}), waiting", training.label());
            return false;
        }
        let Some(text) = selection.active_text() else {
            return false;
        };
        if self.view.borrow().source_text.as_deref() == Some(text) {
            return false;
        }

        inflight.generation += 1;
        let cancel = CancellationToken::new();
        inflight.cancel = Some(cancel.clone());
        inflight.text = Some(text.to_string());

        self.view.send_replace(InsightView {
            source_text: Some(text.to_string()),
            relevant: Vec::new(),
            insight: InsightState::Pending,
        });

        let pipeline = Pipeline {
            generation: inflight.generation,
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            view: Arc::clone(&self.view),
            inflight: Arc::clone(&self.inflight),
            cancel,
        };
        drop(inflight);

        log::info!("insight: pipeline started ({} chars selected)", text.len());
        tokio::spawn(pipeline.run(text.to_string()));
        true
    }

    /// Cancel the running pipeline, if any.
    pub fn cancel(&self) {
        let mut inflight = lock_inflight(&self.inflight);
        if inflight.cancel.is_some() {
            self.abandon(&mut inflight);
        }
    }

    /// The index is being rebuilt: stop any pipeline still querying the old
    /// one and forget the displayed source, so the next `Ready` runs the
    /// active selection again.
    fn invalidate(&self, inflight: &mut Inflight) {
        if inflight.cancel.is_some() {
            self.abandon(inflight);
        }
        self.view.send_if_modified(|view| view.source_text.take().is_some());
    }

    /// Cancel the running pipeline and clear a view it left half-built, so
    /// the same text can trigger a fresh run later.
    fn abandon(&self, inflight: &mut Inflight) {
        if let Some(cancel) = inflight.cancel.take() {
            cancel.cancel();
        }
        inflight.generation += 1;
        inflight.text = None;
        self.view.send_if_modified(|view| {
            if !view.insight.is_pending() {
                return false;
            }
            *view = InsightView::default();
            true
        });
        log::debug!("insight: superseded pipeline abandoned");
    }
}

impl Drop for InsightOrchestrator {
    fn drop(&mut self) {
        if let Some(cancel) = lock_inflight(&self.inflight).cancel.take() {
            cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct Pipeline {
    generation: u64,
    backend: Arc<dyn Backend>,
    config: InsightConfig,
    view: Arc<watch::Sender<InsightView>>,
    inflight: Arc<Mutex<Inflight>>,
    cancel: CancellationToken,
}

impl Pipeline {
    async fn run(self, text: String) {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                log::debug!("insight: pipeline {} cancelled", self.generation);
            }
            _ = self.execute(&text) => {}
        }
    }

    async fn execute(&self, text: &str) {
        // ── 1. Retrieval ─────────────────────────────────────────────────
        let hits = match self
            .backend
            .search_relevant(text, self.config.top_k, self.config.context_window)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("insight: retrieval failed: {e}");
                self.finish(InsightState::Empty);
                return;
            }
        };

        let relevant = rank(hits);
        let prompt = build_insight_prompt(text, &relevant);
        log::debug!("insight: {} passages retrieved", relevant.len());
        if !self.publish(|view| view.relevant = relevant) {
            return;
        }

        // ── 2. Synthesis ─────────────────────────────────────────────────
        let policy = RetryPolicy::with_retries(self.config.max_retries, self.config.backoff_base());
        let backend = &self.backend;
        let prompt = prompt.as_str();
        let result =
            retry_with_policy(&policy, "insight: generate", move |_| backend.generate_text(prompt))
                .await;

        // ── 3. Validation ────────────────────────────────────────────────
        let state = match result {
            Ok(payload) => parse::interpret(&payload),
            Err(e) => {
                log::error!("insight: synthesis gave up: {e}");
                InsightState::Empty
            }
        };
        if self.finish(state) {
            log::info!("insight: pipeline {} finished", self.generation);
        }
    }

    /// Apply `update` to the view unless this pipeline has been superseded.
    fn publish(&self, update: impl FnOnce(&mut InsightView)) -> bool {
        let inflight = lock_inflight(&self.inflight);
        if !self.is_current(&inflight) {
            return false;
        }
        self.view.send_modify(update);
        true
    }

    /// Publish the final insight state and release the in-flight slot.
    fn finish(&self, state: InsightState) -> bool {
        let mut inflight = lock_inflight(&self.inflight);
        if !self.is_current(&inflight) {
            log::debug!("insight: dropping stale result of pipeline {}", self.generation);
            return false;
        }
        inflight.cancel = None;
        self.view.send_modify(|view| view.insight = state);
        true
    }

    fn is_current(&self, inflight: &Inflight) -> bool {
        inflight.generation == self.generation && !self.cancel.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{hit, MockBackend};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn orchestrator(mock: &Arc<MockBackend>) -> InsightOrchestrator {
        let backend: Arc<dyn Backend> = Arc::clone(mock) as Arc<dyn Backend>;
        InsightOrchestrator::new(backend, InsightConfig::default())
    }

    fn selected(text: &str) -> Selection {
        Selection::from_event(text, true)
    }

    async fn wait_settled(orc: &InsightOrchestrator) -> InsightView {
        let mut rx = orc.subscribe();
        let view = tokio::time::timeout(
            Duration::from_secs(60),
            rx.wait_for(|v| !v.insight.is_pending()),
        )
        .await
        .expect("pipeline never settled")
        .expect("view channel closed")
        .clone();
        view
    }

    fn busy(orc: &InsightOrchestrator) -> bool {
        lock_inflight(&orc.inflight).cancel.is_some()
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_index_blocks_pipeline() {
        let mock = Arc::new(MockBackend::new());
        let orc = orchestrator(&mock);

        assert!(!orc.on_selection_changed(&selected("topic"), TrainingState::Pending));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(mock.calls("search"), 0);
        assert_eq!(orc.view(), InsightView::default());
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_selection_blocks_pipeline() {
        let mock = Arc::new(MockBackend::new());
        let orc = orchestrator(&mock);

        let inactive = Selection::from_event("topic", false);
        assert!(!orc.on_selection_changed(&inactive, TrainingState::Ready));
        assert_eq!(mock.calls("search"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retrieval_then_synthesis() {
        let mock = Arc::new(MockBackend::with_hits(vec![
            hit("b.pdf", 2, 0.4),
            hit("a.pdf", 1, 0.9),
        ]));
        let orc = orchestrator(&mock);

        assert!(orc.on_selection_changed(&selected("entropy"), TrainingState::Ready));
        assert!(orc.view().insight.is_pending());
        let view = wait_settled(&orc).await;

        assert_eq!(view.source_text.as_deref(), Some("entropy"));
        assert_eq!(view.relevant[0].doc_id, "a.pdf");
        assert_eq!(view.relevant[1].doc_id, "b.pdf");
        let data = view.insight.data().expect("insight ready");
        assert_eq!(data.key_insights, "insight about entropy");
        assert_eq!(data.connecting_the_dots.len(), 2);
        assert_eq!(mock.call_log(), vec!["search", "generate"]);
        assert!(!busy(&orc));
    }

    #[tokio::test(start_paused = true)]
    async fn same_text_does_not_refire() {
        let mock = Arc::new(MockBackend::new());
        let orc = orchestrator(&mock);

        orc.on_selection_changed(&selected("entropy"), TrainingState::Ready);
        wait_settled(&orc).await;

        assert!(!orc.on_selection_changed(&selected("entropy"), TrainingState::Ready));
        assert_eq!(mock.calls("search"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_selection_wins() {
        let mock = Arc::new(MockBackend::new());
        mock.search_delays
            .lock()
            .unwrap()
            .insert("first".into(), Duration::from_secs(5));
        let orc = orchestrator(&mock);

        assert!(orc.on_selection_changed(&selected("first"), TrainingState::Ready));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(orc.on_selection_changed(&selected("second"), TrainingState::Ready));

        let view = wait_settled(&orc).await;
        assert_eq!(view.source_text.as_deref(), Some("second"));

        // Well past the first pipeline's search delay.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let view = orc.view();
        assert_eq!(view.source_text.as_deref(), Some("second"));
        assert_eq!(
            view.insight.data().map(|d| d.key_insights.as_str()),
            Some("insight about second")
        );
        assert_eq!(mock.calls("generate"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_retries_with_backoff() {
        let mock = Arc::new(MockBackend::new());
        mock.generate_failures.store(2, Ordering::SeqCst);
        let orc = orchestrator(&mock);
        let start = Instant::now();

        orc.on_selection_changed(&selected("entropy"), TrainingState::Ready);
        let view = wait_settled(&orc).await;

        assert!(view.insight.data().is_some());
        assert_eq!(mock.calls("generate"), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_leave_insight_empty() {
        let mock = Arc::new(MockBackend::new());
        mock.generate_failures.store(3, Ordering::SeqCst);
        let orc = orchestrator(&mock);

        orc.on_selection_changed(&selected("entropy"), TrainingState::Ready);
        let view = wait_settled(&orc).await;

        assert_eq!(view.insight, InsightState::Empty);
        assert_eq!(mock.calls("generate"), 3);
        assert!(!busy(&orc));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_unavailable() {
        let mock = Arc::new(MockBackend::new());
        *mock.generate_override.lock().unwrap() = Some(json!({
            "candidates": [ { "content": { "parts": [ { "text": "I am not JSON" } ] } } ]
        }));
        let orc = orchestrator(&mock);

        orc.on_selection_changed(&selected("entropy"), TrainingState::Ready);
        let view = wait_settled(&orc).await;

        assert_eq!(view.insight, InsightState::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_selection_abandons_pipeline() {
        let mock = Arc::new(MockBackend::new());
        mock.search_delays
            .lock()
            .unwrap()
            .insert("slow".into(), Duration::from_secs(5));
        let orc = orchestrator(&mock);

        orc.on_selection_changed(&selected("slow"), TrainingState::Ready);
        orc.on_selection_changed(&Selection::default(), TrainingState::Ready);

        assert!(!busy(&orc));
        assert_eq!(orc.view(), InsightView::default());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.calls("generate"), 0);
        assert_eq!(orc.view(), InsightView::default());

        // The same text may run again once re-selected.
        assert!(orc.on_selection_changed(&selected("slow"), TrainingState::Ready));
    }

    #[tokio::test(start_paused = true)]
    async fn retraining_cancels_pipeline_and_reruns_on_ready() {
        let mock = Arc::new(MockBackend::new());
        mock.search_delays
            .lock()
            .unwrap()
            .insert("topic".into(), Duration::from_secs(5));
        let orc = orchestrator(&mock);
        let topic = selected("topic");

        assert!(orc.on_selection_changed(&topic, TrainingState::Ready));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // A document was added and the index went back to training.
        assert!(!orc.on_selection_changed(&topic, TrainingState::Idle));
        assert!(!busy(&orc));
        assert_eq!(orc.view(), InsightView::default());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.calls("generate"), 0);
        assert!(!orc.on_selection_changed(&topic, TrainingState::Pending));

        assert!(orc.on_selection_changed(&topic, TrainingState::Ready));
        let view = wait_settled(&orc).await;
        assert_eq!(view.source_text.as_deref(), Some("topic"));
        assert!(view.insight.data().is_some());
        assert_eq!(mock.calls("search"), 2);
        assert_eq!(mock.calls("generate"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retraining_reruns_finished_insight() {
        let mock = Arc::new(MockBackend::new());
        let orc = orchestrator(&mock);
        let topic = selected("topic");

        orc.on_selection_changed(&topic, TrainingState::Ready);
        wait_settled(&orc).await;

        orc.on_selection_changed(&topic, TrainingState::Pending);
        let view = orc.view();
        assert_eq!(view.source_text, None);
        assert!(view.insight.data().is_some());

        assert!(orc.on_selection_changed(&topic, TrainingState::Ready));
        wait_settled(&orc).await;
        assert_eq!(mock.calls("search"), 2);
        assert_eq!(orc.view().source_text.as_deref(), Some("topic"));
    }

    #[tokio::test(start_paused = true)]
    async fn visible_relevant_applies_filters() {
        let mock = Arc::new(MockBackend::with_hits(vec![
            hit("a.pdf", 1, 0.9),
            hit("b.pdf", 1, 0.1),
        ]));
        let orc = orchestrator(&mock);

        orc.on_selection_changed(&selected("entropy"), TrainingState::Ready);
        wait_settled(&orc).await;

        let shown = orc.visible_relevant(None);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].doc_id, "a.pdf");
    }
}
