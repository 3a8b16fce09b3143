//! Speech-to-text engine trait and the whisper-rs implementation.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so one loaded model can be
//! shared behind an `Arc<dyn SttEngine>`.  [`WhisperEngine`] creates a fresh
//! `WhisperState` per call, so concurrent calls need no locking.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper operates on 16 kHz mono audio.
pub const SAMPLE_RATE: usize = 16_000;

/// Whisper misbehaves on clips under one second; shorter input is padded.
const MIN_AUDIO_SAMPLES: usize = SAMPLE_RATE;
/// 30 s is one Whisper window; a spoken passphrase never needs more.
const MAX_AUDIO_SAMPLES: usize = 30 * SAMPLE_RATE;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// whisper-rs failed to create a context or per-call state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("audio too long: {0} samples (maximum 30 s at 16 kHz)")]
    AudioTooLong(usize),
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Contract: `audio` is 16 kHz mono f32 PCM in `[-1.0, 1.0]`.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

// ---------------------------------------------------------------------------
// WhisperParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WhisperParams {
    /// ISO-639-1 code (`"cs"`, `"en"`) or `"auto"`.
    pub language: String,
    pub n_threads: i32,
    /// Greedy candidates per step.  1 is fastest.
    pub best_of: i32,
    /// Text fed to the decoder as prior context.  Listing the passphrases
    /// here biases recognition toward them.
    pub initial_prompt: Option<String>,
}

impl Default for WhisperParams {
    fn default() -> Self {
        Self {
            language: "cs".into(),
            n_threads: optimal_threads(),
            best_of: 1,
            initial_prompt: None,
        }
    }
}

/// Available parallelism, capped at 8.
pub fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

/// Zero-pad `audio` up to the minimum Whisper input length.
pub fn pad_to_minimum(audio: &[f32]) -> std::borrow::Cow<'_, [f32]> {
    if audio.len() >= MIN_AUDIO_SAMPLES {
        return std::borrow::Cow::Borrowed(audio);
    }
    let mut padded = Vec::with_capacity(MIN_AUDIO_SAMPLES);
    padded.extend_from_slice(audio);
    padded.resize(MIN_AUDIO_SAMPLES, 0.0);
    std::borrow::Cow::Owned(padded)
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

pub struct WhisperEngine {
    ctx: WhisperContext,
    params: WhisperParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the weights are
// read-only after loading and every call creates its own state.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model file.
    pub fn load(model_path: impl AsRef<Path>, params: WhisperParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        log::info!("stt: loading model {}", path.display());
        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        log::info!(
            "stt: model ready (language={}, threads={})",
            params.language,
            params.n_threads
        );

        Ok(Self { ctx, params })
    }

    pub fn params(&self) -> &WhisperParams {
        &self.params
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy {
            best_of: self.params.best_of,
        });
        let language = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(language);
        fp.set_n_threads(self.params.n_threads);
        if let Some(prompt) = &self.params.initial_prompt {
            fp.set_initial_prompt(prompt);
        }
        // Short commands: one segment, no carry-over between calls.
        fp.set_single_segment(true);
        fp.set_no_context(true);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);
        fp.set_print_timestamps(false);
        fp
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong(audio.len()));
        }
        let audio = pad_to_minimum(audio);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(self.full_params(), &audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        log::debug!(
            "stt: decoded {:.1}s of audio in {} ms",
            audio.len() as f32 / SAMPLE_RATE as f32,
            started.elapsed().as_millis()
        );
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns scripted responses in order, repeating the last one.
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, SttError>>>,
    last: std::sync::Mutex<Result<String, SttError>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::scripted(vec![Ok(text.into())])
    }

    pub fn err(error: SttError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn scripted(responses: Vec<Result<String, SttError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            last: std::sync::Mutex::new(Ok(String::new())),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong(audio.len()));
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
