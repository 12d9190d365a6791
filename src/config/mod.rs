//! Configuration module for DocuMind.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each
//! orchestrator, `AppPaths` for cross-platform directories, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, BackendConfig, InsightConfig, PodcastConfig, TrainingConfig};
