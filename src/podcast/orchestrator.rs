//! Podcast orchestrator: one audio clip per insight.
//!
//! ```text
//! on_insight(data)
//!   ├─ same payload as the loaded/loading clip → nothing to do
//!   └─ cancel previous fetch, release clip, reset transport   [loading]
//!         └─▶ synthesize_audio(data)
//!               ├─ Ok  → artifact installed                   [ready]
//!               └─ Err → warn, no artifact                    [idle]
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::PodcastConfig;
use crate::insight::InsightData;

use super::transport::Transport;

// ---------------------------------------------------------------------------
// AudioArtifact
// ---------------------------------------------------------------------------

/// Synthesised clip, keyed by the insight it narrates.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub key: InsightData,
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioArtifact {
    /// Clip length assuming a constant bitrate.
    pub fn estimated_duration(&self, bitrate_kbps: u32) -> Option<f64> {
        if bitrate_kbps == 0 {
            return None;
        }
        Some(self.bytes.len() as f64 * 8.0 / (f64::from(bitrate_kbps) * 1000.0))
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            _ => "mp3",
        }
    }
}

// ---------------------------------------------------------------------------
// PodcastState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PodcastState {
    pub artifact: Option<Arc<AudioArtifact>>,
    pub transport: Transport,
    /// `true` while a synthesis request is outstanding.
    pub loading: bool,
}

/// The player is shown exactly while a selection is active.
pub fn player_visible(selection_active: bool) -> bool {
    selection_active
}

// ---------------------------------------------------------------------------
// PodcastOrchestrator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FetchSlot {
    generation: u64,
    key: Option<InsightData>,
    cancel: Option<CancellationToken>,
}

pub struct PodcastOrchestrator {
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<PodcastState>>,
    slot: Arc<Mutex<FetchSlot>>,
}

impl PodcastOrchestrator {
    pub fn new(backend: Arc<dyn Backend>, config: &PodcastConfig) -> Self {
        let (state, _) = watch::channel(PodcastState {
            artifact: None,
            transport: Transport::new(config.skip_secs, config.initial_volume),
            loading: false,
        });
        Self {
            backend,
            state: Arc::new(state),
            slot: Arc::new(Mutex::new(FetchSlot::default())),
        }
    }

    pub fn state(&self) -> PodcastState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PodcastState> {
        self.state.subscribe()
    }

    pub fn artifact(&self) -> Option<Arc<AudioArtifact>> {
        self.state.borrow().artifact.clone()
    }

    /// Request a clip for `insight`, replacing whatever was loaded before.
    /// Returns `true` when a new fetch was started.
    pub fn on_insight(&self, insight: &InsightData) -> bool {
        let mut slot = self.lock_slot();
        if slot.key.as_ref() == Some(insight) {
            return false;
        }
        if let Some(previous) = slot.cancel.take() {
            previous.cancel();
            log::debug!("podcast: previous audio fetch cancelled");
        }
        slot.generation += 1;
        slot.key = Some(insight.clone());
        let cancel = CancellationToken::new();
        slot.cancel = Some(cancel.clone());

        self.state.send_modify(|state| {
            state.artifact = None;
            state.transport.reset();
            state.loading = true;
        });

        let fetch = Fetch {
            generation: slot.generation,
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
            slot: Arc::clone(&self.slot),
            cancel,
        };
        drop(slot);

        tokio::spawn(fetch.run(insight.clone()));
        true
    }

    /// Abort any fetch and unload the clip (insight went away).
    pub fn release(&self) {
        let mut slot = self.lock_slot();
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.generation += 1;
        slot.key = None;
        self.state.send_if_modified(|state| {
            let changed = state.artifact.is_some() || state.loading;
            state.artifact = None;
            state.loading = false;
            state.transport.reset();
            changed
        });
    }

    // ---- transport --------------------------------------------------------

    /// Play/pause. Does nothing until a clip is loaded; returns the playing
    /// flag afterwards.
    pub fn toggle_play(&self) -> bool {
        let mut playing = false;
        self.state.send_if_modified(|state| {
            if state.artifact.is_none() {
                return false;
            }
            playing = state.transport.toggle();
            true
        });
        playing
    }

    pub fn seek(&self, secs: f64) {
        self.state.send_modify(|state| state.transport.seek(secs));
    }

    pub fn skip_forward(&self) {
        self.state.send_modify(|state| state.transport.skip_forward());
    }

    pub fn set_volume(&self, volume: f32) {
        self.state.send_modify(|state| state.transport.set_volume(volume));
    }

    pub fn cycle_rate(&self) -> f32 {
        let mut rate = 1.0;
        self.state.send_modify(|state| rate = state.transport.cycle_rate());
        rate
    }

    /// Stop and rewind without unloading the clip.
    pub fn reset(&self) {
        self.state.send_modify(|state| state.transport.reset());
    }

    /// Clip length reported by the audio sink.
    pub fn on_metadata(&self, duration_secs: f64) {
        self.state
            .send_modify(|state| state.transport.set_duration(duration_secs));
    }

    /// Advance playback by `elapsed` seconds; returns `true` when the clip ended.
    pub fn tick(&self, elapsed: f64) -> bool {
        let mut ended = false;
        self.state.send_if_modified(|state| {
            if !state.transport.is_playing() {
                return false;
            }
            ended = state.transport.tick(elapsed);
            true
        });
        ended
    }

    fn lock_slot(&self) -> MutexGuard<'_, FetchSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PodcastOrchestrator {
    fn drop(&mut self) {
        if let Some(cancel) = self.lock_slot().cancel.take() {
            cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

struct Fetch {
    generation: u64,
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<PodcastState>>,
    slot: Arc<Mutex<FetchSlot>>,
    cancel: CancellationToken,
}

impl Fetch {
    async fn run(self, insight: InsightData) {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                log::debug!("podcast: fetch {} cancelled", self.generation);
                return;
            }
            result = self.backend.synthesize_audio(&insight) => result,
        };

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != self.generation || self.cancel.is_cancelled() {
            log::debug!("podcast: dropping stale audio of fetch {}", self.generation);
            return;
        }
        slot.cancel = None;

        match result {
            Ok(payload) => {
                log::info!(
                    "podcast: clip ready ({} bytes, {})",
                    payload.bytes.len(),
                    payload.mime
                );
                let artifact = AudioArtifact {
                    key: insight,
                    bytes: payload.bytes,
                    mime: payload.mime,
                };
                self.state.send_modify(|state| {
                    state.artifact = Some(Arc::new(artifact));
                    state.loading = false;
                });
            }
            Err(e) => {
                log::warn!("podcast: audio synthesis failed: {e}");
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
