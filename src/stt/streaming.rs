//! Incremental recogniser built on a whole-clip [`SttEngine`].
//!
//! Whisper decodes complete clips, so [`StreamingTranscriber`] adds the
//! streaming behaviour the access evaluator expects:
//!
//! ```text
//!  s16le chunk ─▶ f32 ─▶ EnergyGate (30 ms frames)
//!                            │
//!            voiced frame ───┼──▶ start / extend utterance
//!            silent frame ───┘    (trailing silence counted)
//!
//!  every partial_interval of speech ─▶ decode ─▶ {"partial": ".."}
//!  trailing silence ≥ endpoint     ─▶ decode ─▶ {"text": ".."}  feed() = true
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::engine::{SttEngine, SAMPLE_RATE};
use crate::access::{Transcriber, TranscriberError};
use crate::audio::pcm::pcm16le_to_f32;
use crate::audio::vad::EnergyGate;

// ---------------------------------------------------------------------------
// StreamingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamingConfig {
    /// RMS level separating speech from background.
    pub vad_threshold: f32,
    /// Trailing silence that closes an utterance.
    pub endpoint_silence: Duration,
    /// Speech between two partial decodes.  Zero disables partials.
    pub partial_interval: Duration,
    /// Utterances are force-closed at this length.
    pub max_utterance: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.01,
            endpoint_silence: Duration::from_millis(600),
            partial_interval: Duration::from_millis(1_000),
            max_utterance: Duration::from_secs(15),
        }
    }
}

fn samples_for(duration: Duration) -> usize {
    (duration.as_secs_f64() * SAMPLE_RATE as f64).round() as usize
}

// ---------------------------------------------------------------------------
// StreamingTranscriber
// ---------------------------------------------------------------------------

pub struct StreamingTranscriber {
    engine: Arc<dyn SttEngine>,
    gate: EnergyGate,
    endpoint_samples: usize,
    partial_samples: usize,
    max_samples: usize,

    utterance: Vec<f32>,
    in_speech: bool,
    trailing_silence: usize,
    since_partial: usize,
    partial: String,
    final_text: Option<String>,
}

impl StreamingTranscriber {
    pub fn new(engine: Arc<dyn SttEngine>, config: StreamingConfig) -> Self {
        Self {
            engine,
            gate: EnergyGate::new(config.vad_threshold),
            endpoint_samples: samples_for(config.endpoint_silence).max(1),
            partial_samples: samples_for(config.partial_interval),
            max_samples: samples_for(config.max_utterance).max(1),
            utterance: Vec::new(),
            in_speech: false,
            trailing_silence: 0,
            since_partial: 0,
            partial: String::new(),
            final_text: None,
        }
    }

    /// Whether an utterance is currently open.
    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    fn decode(&self) -> Result<String, TranscriberError> {
        self.engine
            .transcribe(&self.utterance)
            .map_err(|e| TranscriberError::Feed(e.to_string()))
    }

    fn close_utterance(&mut self) -> Result<bool, TranscriberError> {
        // Drop the trailing silence before the last decode.
        let voiced_len = self.utterance.len().saturating_sub(self.trailing_silence);
        self.utterance.truncate(voiced_len);

        let result = self.decode();
        self.utterance.clear();
        self.in_speech = false;
        self.trailing_silence = 0;
        self.since_partial = 0;
        self.partial.clear();

        let text = result?;
        log::debug!("stt: utterance closed");
        self.final_text = Some(text);
        Ok(true)
    }
}

impl Transcriber for StreamingTranscriber {
    fn reset(&mut self) {
        self.utterance.clear();
        self.in_speech = false;
        self.trailing_silence = 0;
        self.since_partial = 0;
        self.partial.clear();
        self.final_text = None;
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<bool, TranscriberError> {
        if chunk.len() % 2 != 0 {
            return Err(TranscriberError::Feed(format!(
                "odd chunk length {} for 16-bit PCM",
                chunk.len()
            )));
        }
        let samples = pcm16le_to_f32(chunk);

        for (frame, voiced) in self.gate.classify(&samples) {
            if voiced {
                if !self.in_speech {
                    log::debug!("stt: speech started");
                    self.in_speech = true;
                    self.utterance.clear();
                    self.since_partial = 0;
                }
                self.trailing_silence = 0;
            } else if self.in_speech {
                self.trailing_silence += frame.len();
            } else {
                continue;
            }
            self.utterance.extend_from_slice(frame);
            self.since_partial += frame.len();
        }

        if !self.in_speech {
            return Ok(false);
        }
        if self.trailing_silence >= self.endpoint_samples || self.utterance.len() >= self.max_samples {
            return self.close_utterance();
        }
        if self.partial_samples > 0 && self.since_partial >= self.partial_samples {
            self.since_partial = 0;
            match self.decode() {
                Ok(text) => self.partial = text,
                Err(e) => log::warn!("stt: partial decode failed: {}", e),
            }
        }
        Ok(false)
    }

    fn partial_text(&mut self) -> String {
        json!({ "partial": self.partial }).to_string()
    }

    fn final_text(&mut self) -> String {
        let text = self.final_text.take().unwrap_or_default();
        json!({ "text": text }).to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
