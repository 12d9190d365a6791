//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\documind\
//!   macOS:   ~/Library/Application Support/documind/
//!   Linux:   ~/.config/documind/
//!
//! Data dir (saved podcast audio):
//!   Windows: %LOCALAPPDATA%\documind\
//!   macOS:   ~/Library/Application Support/documind/
//!   Linux:   ~/.local/share/documind/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory where synthesised podcast audio is written.
    pub media_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "documind";

    /// Resolves all paths using the `dirs` crate, falling back to the
    /// current directory when the platform has no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            media_dir: data_dir.join("media"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
