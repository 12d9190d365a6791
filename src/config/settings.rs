//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the HTTP backend collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Maximum seconds to wait for any single backend response.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingConfig
// ---------------------------------------------------------------------------

/// Timing of the retrieval-index training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Delay between two `trainingStatus` polls.
    pub poll_interval_ms: u64,
    /// Delay before the single restart that follows a failed job.
    pub restart_delay_ms: u64,
}

impl TrainingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            restart_delay_ms: 3_000,
        }
    }
}

// ---------------------------------------------------------------------------
// InsightConfig
// ---------------------------------------------------------------------------

/// Retrieval and synthesis parameters for the insight pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Number of passages requested from `searchRelevant`.
    pub top_k: usize,
    /// Paragraphs of surrounding context attached to each passage.
    pub context_window: usize,
    /// Retries after the first failed `generateText` call.
    pub max_retries: u32,
    /// Backoff unit; the n-th retry waits `n * backoff_base_ms`.
    pub backoff_base_ms: u64,
    /// Passages scoring at or below this are hidden from the relevant panel.
    pub min_score: f32,
    /// Per-document cap applied once the viewed document has this many hits.
    pub max_per_document: usize,
}

impl InsightConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            context_window: 1,
            max_retries: 2,
            backoff_base_ms: 1_000,
            min_score: 0.35,
            max_per_document: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// PodcastConfig
// ---------------------------------------------------------------------------

/// Podcast player defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    /// Seconds jumped by the skip-forward control.
    pub skip_secs: f64,
    /// Volume applied to a freshly created player (0.0 – 1.0).
    pub initial_volume: f32,
    /// Bitrate used by the headless binary to estimate clip duration when no
    /// audio sink reports it.
    pub assumed_bitrate_kbps: u32,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            skip_secs: 10.0,
            initial_volume: 1.0,
            assumed_bitrate_kbps: 48,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use documind::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend endpoint settings.
    pub backend: BackendConfig,
    /// Training job timing.
    pub training: TrainingConfig,
    /// Retrieval + synthesis parameters.
    pub insight: InsightConfig,
    /// Podcast player settings.
    pub podcast: PodcastConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
