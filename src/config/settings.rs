//! Application settings structs, defaults and TOML persistence.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! values it changes:
//!
//! ```toml
//! [security]
//! max_attempts = 5
//!
//! [mqtt]
//! broker = "192.168.1.20"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::access::{EvaluatorConfig, PolicyConfig, SegmenterConfig};
use crate::stt::{StreamingConfig, WhisperParams};

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// SecurityConfig
// ---------------------------------------------------------------------------

/// Failed-attempt lockout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Consecutive failures before lockout.  `0` disables lockout.
    pub max_attempts: u32,
    /// Lockout length in seconds.  `0` disables lockout.
    pub lockout_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            lockout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// ListeningConfig
// ---------------------------------------------------------------------------

/// Timing of one listening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    pub hard_timeout_secs: f32,
    pub silence_threshold_secs: f32,
    pub grace_extension_secs: f32,
    /// Pause after the prompt cue before the microphone opens.
    pub settle_delay_ms: u64,
    /// Bytes per audio read (16 kHz s16le).
    pub chunk_bytes: usize,
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            hard_timeout_secs: 15.0,
            silence_threshold_secs: 2.0,
            grace_extension_secs: 1.0,
            settle_delay_ms: 500,
            chunk_bytes: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// PassphraseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassphraseConfig {
    /// Passphrase list location.  `None` uses `passwords.txt` in the config
    /// directory.
    pub file: Option<PathBuf>,
    pub case_sensitive: bool,
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Whisper model and streaming recogniser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Model name (`"small"`), file name in the models dir, or absolute path.
    pub model: String,
    /// ISO-639-1 code or `"auto"`.
    pub language: String,
    /// Feed the passphrase list to Whisper as its initial prompt.  Off by
    /// default: Whisper tends to echo its prompt when decoding noise, so a
    /// cough or a door slam can come back as a passphrase.
    pub prompt_with_passphrases: bool,
    /// RMS level that counts as speech.
    pub vad_threshold: f32,
    pub endpoint_silence_ms: u64,
    pub partial_interval_ms: u64,
    pub max_utterance_secs: f32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "small".into(),
            language: "cs".into(),
            prompt_with_passphrases: false,
            vad_threshold: 0.01,
            endpoint_silence_ms: 600,
            partial_interval_ms: 1_000,
            max_utterance_secs: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name.  `None` means the system default.
    pub input_device: Option<String>,
    /// Rate delivered to the recogniser.  Whisper requires 16 000.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            sample_rate: 16_000,
        }
    }
}

// ---------------------------------------------------------------------------
// SoundsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    /// Cue directory.  `None` uses `sounds/` in the data directory.
    pub dir: Option<PathBuf>,
    /// Always use the quiet (`-10pm-`) variants.
    pub force_quiet_hours: bool,
}

// ---------------------------------------------------------------------------
// MqttConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 0, 1 or 2.
    pub qos: u8,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: "localhost".into(),
            port: 1883,
            topic: "home/door/unlock".into(),
            client_id: "voice-gate".into(),
            username: None,
            password: None,
            qos: 1,
            keep_alive_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Global hotkey that starts an evaluation.  Empty disables it.
    pub hotkey: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            hotkey: "F9".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub security: SecurityConfig,
    pub listening: ListeningConfig,
    pub passphrases: PassphraseConfig,
    pub stt: SttConfig,
    pub audio: AudioConfig,
    pub sounds: SoundsConfig,
    pub mqtt: MqttConfig,
    pub trigger: TriggerConfig,
}

impl AppConfig {
    /// Load from the resolved `settings.toml` (see [`AppPaths`]).
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        log::info!("config: loaded {}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let l = &self.listening;
        for (name, value) in [
            ("listening.hard_timeout_secs", l.hard_timeout_secs),
            ("listening.silence_threshold_secs", l.silence_threshold_secs),
            ("listening.grace_extension_secs", l.grace_extension_secs),
            ("stt.max_utterance_secs", self.stt.max_utterance_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number, got {value}");
            }
        }
        if l.hard_timeout_secs == 0.0 {
            bail!("listening.hard_timeout_secs must be greater than zero");
        }
        if l.chunk_bytes < 2 || l.chunk_bytes % 2 != 0 {
            bail!("listening.chunk_bytes must be a positive even number, got {}", l.chunk_bytes);
        }
        if self.audio.sample_rate != 16_000 {
            bail!("audio.sample_rate must be 16000, got {}", self.audio.sample_rate);
        }
        if !(0.0..=1.0).contains(&self.stt.vad_threshold) {
            bail!("stt.vad_threshold must be within 0.0..=1.0");
        }
        if self.mqtt.qos > 2 {
            bail!("mqtt.qos must be 0, 1 or 2, got {}", self.mqtt.qos);
        }
        if self.mqtt.enabled && self.mqtt.topic.trim().is_empty() {
            bail!("mqtt.topic must not be empty");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolved paths
    // -----------------------------------------------------------------------

    pub fn passphrase_file(&self, paths: &AppPaths) -> PathBuf {
        self.passphrases
            .file
            .clone()
            .unwrap_or_else(|| paths.passphrase_file.clone())
    }

    pub fn sounds_dir(&self, paths: &AppPaths) -> PathBuf {
        self.sounds
            .dir
            .clone()
            .unwrap_or_else(|| paths.sounds_dir.clone())
    }

    // -----------------------------------------------------------------------
    // Component configs
    // -----------------------------------------------------------------------

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            max_attempts: self.security.max_attempts,
            lockout_duration: Duration::from_secs(self.security.lockout_secs),
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            hard_timeout: secs(self.listening.hard_timeout_secs),
            silence_threshold: secs(self.listening.silence_threshold_secs),
            grace_extension: secs(self.listening.grace_extension_secs),
        }
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            segmenter: self.segmenter_config(),
            settle_delay: Duration::from_millis(self.listening.settle_delay_ms),
            chunk_bytes: self.listening.chunk_bytes,
        }
    }

    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            vad_threshold: self.stt.vad_threshold,
            endpoint_silence: Duration::from_millis(self.stt.endpoint_silence_ms),
            partial_interval: Duration::from_millis(self.stt.partial_interval_ms),
            max_utterance: secs(self.stt.max_utterance_secs),
        }
    }

    /// Whisper parameters; `passphrases` become the initial prompt when
    /// `stt.prompt_with_passphrases` is set.
    pub fn whisper_params(&self, passphrases: &[String]) -> WhisperParams {
        let initial_prompt = (self.stt.prompt_with_passphrases && !passphrases.is_empty())
            .then(|| passphrases.join(", "));
        WhisperParams {
            language: self.stt.language.clone(),
            initial_prompt,
            ..WhisperParams::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
