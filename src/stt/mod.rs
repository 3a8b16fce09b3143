//! STT (Speech-to-Text) engine module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SttEngine (trait)                   │
//! │                                                      │
//! │   ┌──────────────────┐    ┌──────────────┐           │
//! │   │resolve_model_path│───▶│ WhisperEngine│           │
//! │   └──────────────────┘    └──────┬───────┘           │
//! │                                  │ whole clip        │
//! │                                  ▼                   │
//! │                      ┌──────────────────────┐        │
//! │                      │ StreamingTranscriber │        │
//! │                      │ s16le chunks → JSON  │        │
//! │                      └──────────────────────┘        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_gate::stt::{StreamingConfig, StreamingTranscriber, WhisperEngine, WhisperParams};
//!
//! let engine = WhisperEngine::load("models/ggml-small.bin", WhisperParams::default())
//!     .expect("model not found");
//! let transcriber = StreamingTranscriber::new(Arc::new(engine), StreamingConfig::default());
//! ```

pub mod engine;
pub mod model;
pub mod streaming;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{optimal_threads, SttEngine, SttError, WhisperEngine, WhisperParams, SAMPLE_RATE};
pub use model::resolve_model_path;
pub use streaming::{StreamingConfig, StreamingTranscriber};

#[cfg(test)]
pub use engine::MockSttEngine;
