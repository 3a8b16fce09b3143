//! Configuration for the voice gate.
//!
//! Provides `AppConfig` (top-level settings), one section struct per
//! subsystem, `AppPaths` for platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, CONFIG_ENV};
pub use settings::{
    AppConfig, AudioConfig, ListeningConfig, MqttConfig, PassphraseConfig, SecurityConfig,
    SoundsConfig, SttConfig, TriggerConfig,
};
