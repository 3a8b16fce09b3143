//! Voice-triggered door access.
//!
//! A trigger (button, hotkey) starts one evaluation: a prompt cue plays, the
//! microphone is streamed through the recogniser, the first complete
//! sentence is matched against the passphrase list, and a successful match
//! publishes an unlock message over MQTT.

pub mod access;
pub mod audio;
pub mod config;
pub mod hotkey;
pub mod passphrase;
pub mod stt;
pub mod unlock;
