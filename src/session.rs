//! Session: owned context wiring every component together.
//!
//! [`Session`] holds the document store, the coordinators and the
//! orchestrators, and exposes the operations a front-end needs. Components
//! never reach for each other directly; [`Session::run`] forwards changes
//! between them:
//!
//! ```text
//! store revision ─────────────▶ training.on_documents_changed
//! selection / training state ─▶ insight.on_selection_changed
//! insight Ready ──────────────▶ podcast.on_insight
//! ```
//!
//! `run` should be spawned as a tokio task; it returns after
//! [`Session::shutdown`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::AppConfig;
use crate::insight::{InsightOrchestrator, InsightState, InsightView, RelevantResult};
use crate::podcast::{self, PodcastOrchestrator};
use crate::selection::{Selection, SelectionBridge, Viewer};
use crate::store::{self, Document, OutlineEntry, SharedStore};
use crate::training::{TrainingCoordinator, TrainingState};
use crate::upload::{DuplicatePrompt, PendingFile, UploadError, UploadResolver};

pub struct Session {
    config: AppConfig,
    store: SharedStore,
    uploads: UploadResolver,
    training: TrainingCoordinator,
    selection: SelectionBridge,
    insight: InsightOrchestrator,
    podcast: PodcastOrchestrator,
    active: Mutex<Option<String>>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>) -> Self {
        let store = store::new_shared_store();
        Self {
            uploads: UploadResolver::new(Arc::clone(&backend), Arc::clone(&store)),
            training: TrainingCoordinator::new(Arc::clone(&backend), config.training.clone()),
            selection: SelectionBridge::new(),
            insight: InsightOrchestrator::new(Arc::clone(&backend), config.insight.clone()),
            podcast: PodcastOrchestrator::new(backend, &config.podcast),
            active: Mutex::new(None),
            shutdown: CancellationToken::new(),
            store,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Forward component changes until [`Session::shutdown`] is called.
    pub async fn run(&self) {
        let mut revisions = store::lock(&self.store).subscribe();
        let mut selections = self.selection.subscribe();
        let mut training = self.training.subscribe();
        let mut insights = self.insight.subscribe();

        self.sync_training();
        self.sync_insight();
        self.sync_podcast();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Ok(()) = revisions.changed() => self.sync_training(),
                Ok(()) = selections.changed() => self.sync_insight(),
                Ok(()) = training.changed() => self.sync_insight(),
                Ok(()) = insights.changed() => self.sync_podcast(),
                else => break,
            }
        }

        log::info!("session: event loop stopped");
    }

    /// Stop the event loop and every background job.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.training.cancel();
        self.insight.cancel();
        self.podcast.release();
    }

    fn sync_training(&self) {
        let (revision, count) = {
            let store = store::lock(&self.store);
            (store.revision(), store.len())
        };
        self.training.on_documents_changed(revision, count);
    }

    fn sync_insight(&self) {
        self.insight
            .on_selection_changed(&self.selection.current(), self.training.state());
    }

    /// Only a `Ready` insight may own a clip; any other state drops the
    /// previous clip and stops its fetch.
    fn sync_podcast(&self) {
        match self.insight.view().insight {
            InsightState::Ready(data) => {
                self.podcast.on_insight(&data);
            }
            _ => self.podcast.release(),
        }
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub async fn upload(
        &self,
        files: Vec<PendingFile>,
        prompt: &dyn DuplicatePrompt,
    ) -> Vec<(String, Result<Document, UploadError>)> {
        self.uploads.submit_batch(files, prompt).await
    }

    /// Delete a document; closing it first if it is the one being read.
    pub async fn delete(&self, name: &str) -> Result<(), UploadError> {
        self.uploads.delete(name).await?;
        let was_active = {
            let mut active = self.lock_active();
            let hit = active.as_deref() == Some(name);
            if hit {
                *active = None;
            }
            hit
        };
        if was_active {
            self.selection.clear();
        }
        Ok(())
    }

    pub async fn load_inventory(&self) -> Result<usize, UploadError> {
        self.uploads.load_inventory().await
    }

    pub fn documents(&self) -> Vec<Document> {
        store::lock(&self.store).documents().to_vec()
    }

    pub fn outline(&self, name: &str) -> Vec<OutlineEntry> {
        store::lock(&self.store)
            .outline(name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn active_document(&self) -> Option<String> {
        self.lock_active().clone()
    }

    /// Make `name` the document being read. Switching documents clears the
    /// selection. Returns `false` for unknown names.
    pub fn open_document(&self, name: &str) -> bool {
        if !store::lock(&self.store).contains(name) {
            log::warn!("session: cannot open unknown document {name}");
            return false;
        }
        let switched = {
            let mut active = self.lock_active();
            if active.as_deref() == Some(name) {
                false
            } else {
                *active = Some(name.to_string());
                true
            }
        };
        if switched {
            log::info!("session: reading {name}");
            self.selection.clear();
        }
        true
    }

    // -----------------------------------------------------------------------
    // Selection & insight
    // -----------------------------------------------------------------------

    /// Viewer callback for text selection.
    pub fn select(&self, text: &str, is_active: bool) {
        self.selection.on_selection(text, is_active);
    }

    pub fn dismiss(&self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> Selection {
        self.selection.current()
    }

    pub fn training_state(&self) -> TrainingState {
        self.training.state()
    }

    pub fn subscribe_training(&self) -> watch::Receiver<TrainingState> {
        self.training.subscribe()
    }

    pub fn insight_view(&self) -> InsightView {
        self.insight.view()
    }

    pub fn subscribe_insight(&self) -> watch::Receiver<InsightView> {
        self.insight.subscribe()
    }

    /// Relevant passages filtered for the document being read.
    pub fn visible_relevant(&self) -> Vec<RelevantResult> {
        self.insight
            .visible_relevant(self.active_document().as_deref())
    }

    /// Jump to a relevant passage, switching documents first when needed.
    pub fn open_result(&self, result: &RelevantResult, viewer: &dyn Viewer) {
        if self.active_document().as_deref() != Some(result.doc_id.as_str()) {
            if !self.open_document(&result.doc_id) {
                return;
            }
            viewer.open_document(&result.doc_id);
        }
        viewer.goto_page(result.page);
    }

    // -----------------------------------------------------------------------
    // Podcast
    // -----------------------------------------------------------------------

    pub fn podcast(&self) -> &PodcastOrchestrator {
        &self.podcast
    }

    pub fn player_visible(&self) -> bool {
        podcast::player_visible(self.selection.has_selection())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{hit, MockBackend};
    use crate::upload::{DuplicateChoice, FixedChoice};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingViewer {
        events: Mutex<Vec<String>>,
    }

    impl Viewer for RecordingViewer {
        fn open_document(&self, name: &str) {
            self.events.lock().unwrap().push(format!("open {name}"));
        }

        fn goto_page(&self, page: u32) {
            self.events.lock().unwrap().push(format!("page {page}"));
        }
    }

    fn start(mock: &Arc<MockBackend>) -> Arc<Session> {
        let session = Arc::new(Session::new(
            AppConfig::default(),
            Arc::clone(mock) as Arc<dyn Backend>,
        ));
        let runner = Arc::clone(&session);
        tokio::spawn(async move { runner.run().await });
        session
    }

    async fn upload(session: &Session, name: &str) {
        let outcomes = session
            .upload(
                vec![PendingFile::new(name, b"%PDF".to_vec())],
                &FixedChoice(DuplicateChoice::Cancel),
            )
            .await;
        assert!(outcomes[0].1.is_ok());
    }

    async fn wait_ready(session: &Session) {
        let mut rx = session.subscribe_training();
        tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| s.is_ready()))
            .await
            .expect("training never became ready")
            .expect("training channel closed");
    }

    #[tokio::test(start_paused = true)]
    async fn selection_to_insight_to_podcast() {
        let mock = Arc::new(MockBackend::with_hits(vec![
            hit("a.pdf", 3, 0.9),
            hit("b.pdf", 5, 0.8),
        ]));
        let session = start(&mock);

        upload(&session, "a.pdf").await;
        upload(&session, "b.pdf").await;
        assert!(session.open_document("a.pdf"));
        wait_ready(&session).await;

        session.select("entropy", true);
        assert!(session.player_visible());

        let mut rx = session.subscribe_insight();
        let view = tokio::time::timeout(
            Duration::from_secs(60),
            rx.wait_for(|v| v.insight.data().is_some()),
        )
        .await
        .expect("insight never arrived")
        .expect("insight channel closed")
        .clone();
        assert_eq!(view.source_text.as_deref(), Some("entropy"));

        let mut audio = session.podcast().subscribe();
        let clip = tokio::time::timeout(
            Duration::from_secs(60),
            audio.wait_for(|s| s.artifact.is_some()),
        )
        .await
        .expect("audio never arrived")
        .expect("podcast channel closed")
        .artifact
        .clone()
        .expect("artifact");
        assert_eq!(clip.bytes, b"insight about entropy");

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn pending_insight_drops_previous_clip() {
        let mock = Arc::new(MockBackend::new());
        *mock.audio_delay.lock().unwrap() = Some(Duration::from_secs(5));
        mock.search_delays
            .lock()
            .unwrap()
            .insert("second".into(), Duration::from_secs(30));
        let session = start(&mock);
        upload(&session, "a.pdf").await;
        wait_ready(&session).await;

        session.select("first", true);
        let mut rx = session.subscribe_insight();
        tokio::time::timeout(
            Duration::from_secs(60),
            rx.wait_for(|v| v.insight.data().is_some()),
        )
        .await
        .expect("insight never arrived")
        .expect("insight channel closed");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.podcast().state().loading);

        // The clip for "first" would land while "second" is still pending.
        session.select("second", true);
        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = session.podcast().state();
        assert!(session.insight_view().insight.is_pending());
        assert!(state.artifact.is_none());
        assert!(!state.loading);

        tokio::time::sleep(Duration::from_secs(40)).await;
        let clip = session.podcast().artifact().expect("clip for second");
        assert_eq!(clip.bytes, b"insight about second");
        assert_eq!(mock.calls("audio"), 2);

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn adding_document_mid_pipeline_reruns_insight() {
        let mock = Arc::new(MockBackend::new());
        mock.search_delays
            .lock()
            .unwrap()
            .insert("topic".into(), Duration::from_secs(5));
        let session = start(&mock);
        upload(&session, "a.pdf").await;
        wait_ready(&session).await;

        session.select("topic", true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.calls("search"), 1);

        upload(&session, "b.pdf").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.insight_view(), InsightView::default());

        wait_ready(&session).await;
        let mut rx = session.subscribe_insight();
        let view = tokio::time::timeout(
            Duration::from_secs(60),
            rx.wait_for(|v| v.insight.data().is_some()),
        )
        .await
        .expect("insight never arrived")
        .expect("insight channel closed")
        .clone();
        assert_eq!(view.source_text.as_deref(), Some("topic"));
        assert_eq!(mock.calls("search"), 2);
        assert_eq!(mock.calls("generate"), 1);

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn selection_waits_for_ready_index() {
        let mock = Arc::new(MockBackend::new());
        let session = start(&mock);

        upload(&session, "a.pdf").await;
        session.select("early", true);
        tokio::task::yield_now().await;
        assert_eq!(mock.calls("search"), 0);

        wait_ready(&session).await;
        let mut rx = session.subscribe_insight();
        tokio::time::timeout(
            Duration::from_secs(60),
            rx.wait_for(|v| v.insight.data().is_some()),
        )
        .await
        .expect("insight never arrived")
        .expect("insight channel closed");
        assert_eq!(mock.calls("search"), 1);

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn new_document_retrains() {
        let mock = Arc::new(MockBackend::new());
        let session = start(&mock);

        upload(&session, "a.pdf").await;
        wait_ready(&session).await;
        upload(&session, "b.pdf").await;
        let mut rx = session.subscribe_training();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| !s.is_ready()))
            .await
            .expect("new revision did not invalidate the index")
            .expect("training channel closed");

        wait_ready(&session).await;
        assert_eq!(mock.calls("train"), 2);

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn switching_document_clears_selection() {
        let mock = Arc::new(MockBackend::new());
        let session = start(&mock);
        upload(&session, "a.pdf").await;
        upload(&session, "b.pdf").await;

        session.open_document("a.pdf");
        session.select("something", true);
        assert!(session.selection().is_active);

        session.open_document("a.pdf");
        assert!(session.selection().is_active);

        session.open_document("b.pdf");
        assert_eq!(session.selection(), Selection::default());
        assert!(!session.player_visible());
        assert!(!session.open_document("missing.pdf"));

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_active_document_closes_it() {
        let mock = Arc::new(MockBackend::new());
        let session = start(&mock);
        upload(&session, "a.pdf").await;
        session.open_document("a.pdf");
        session.select("text", true);

        session.delete("a.pdf").await.unwrap();

        assert_eq!(session.active_document(), None);
        assert!(!session.selection().is_active);
        assert!(session.documents().is_empty());

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn open_result_switches_document_before_jumping() {
        let mock = Arc::new(MockBackend::new());
        let session = start(&mock);
        upload(&session, "a.pdf").await;
        upload(&session, "b.pdf").await;
        session.open_document("a.pdf");
        let viewer = RecordingViewer::default();

        session.open_result(&RelevantResult::from(hit("a.pdf", 4, 0.9)), &viewer);
        session.open_result(&RelevantResult::from(hit("b.pdf", 9, 0.8)), &viewer);

        assert_eq!(
            *viewer.events.lock().unwrap(),
            vec!["page 4", "open b.pdf", "page 9"]
        );
        assert_eq!(session.active_document().as_deref(), Some("b.pdf"));

        session.shutdown();
    }
}
