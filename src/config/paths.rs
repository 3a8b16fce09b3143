//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + passphrase list):
//!   Linux:   ~/.config/voice-gate/
//!   macOS:   ~/Library/Application Support/voice-gate/
//!   Windows: %APPDATA%\voice-gate\
//!
//! Data dir (models + sound cues):
//!   Linux:   ~/.local/share/voice-gate/
//!   macOS:   ~/Library/Application Support/voice-gate/
//!   Windows: %LOCALAPPDATA%\voice-gate\
//!
//! `VOICE_GATE_CONFIG` overrides the location of `settings.toml`.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that points at an alternative `settings.toml`.
pub const CONFIG_ENV: &str = "VOICE_GATE_CONFIG";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default passphrase list, `passwords.txt`.
    pub passphrase_file: PathBuf,
    /// Directory holding `prompt-0.mp3`, `success-0.mp3`, ...
    pub sounds_dir: PathBuf,
    /// Directory for GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-gate";

    /// Resolves all paths using the `dirs` crate and the environment.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        Self::resolve(std::env::var_os(CONFIG_ENV))
    }

    fn resolve(settings_override: Option<OsString>) -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = settings_override
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("settings.toml"));

        Self {
            passphrase_file: config_dir.join("passwords.txt"),
            sounds_dir: data_dir.join("sounds"),
            models_dir: data_dir.join("models"),
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
