//! Podcast module: audio narration of the current insight.
//!
//! * [`PodcastOrchestrator`] fetches one [`AudioArtifact`] per insight and
//!   owns the player state.
//! * [`Transport`] models play/pause, seek, skip, volume and rate.

pub mod orchestrator;
pub mod transport;

pub use orchestrator::{player_visible, AudioArtifact, PodcastOrchestrator, PodcastState};
pub use transport::{format_time, Transport, PLAYBACK_RATES};
