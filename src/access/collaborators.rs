//! Seams between the decision engine and the outside world.
//!
//! The evaluator only talks to hardware and the network through these traits.
//! Production adapters live in `audio`, `stt`, `hotkey` and `unlock`; the test
//! suite uses scripted fakes.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Audio input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioSourceError {
    /// The device could not be opened.
    #[error("audio device unavailable: {0}")]
    Unavailable(String),

    /// The stream failed after it was opened.
    #[error("audio read failed: {0}")]
    Read(String),

    /// Shutdown was requested while a read was blocked.
    #[error("audio read interrupted by shutdown")]
    Interrupted,
}

/// An open capture stream producing 16 kHz mono signed 16-bit little-endian
/// PCM.  Dropping it releases the device.
///
/// Not required to be `Send`: a source is opened, read and dropped on the
/// thread running the evaluation.
pub trait AudioSource {
    /// Block until up to `max_bytes` of audio are available.
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioSourceError>;
}

/// Factory that opens a fresh [`AudioSource`] for each evaluation.
pub trait AudioInput: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioSource>, AudioSourceError>;
}

// ---------------------------------------------------------------------------
// Transcriber
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscriberError {
    #[error("transcriber rejected audio chunk: {0}")]
    Feed(String),
}

/// Streaming speech recogniser with a pull-style result API.
///
/// `partial_text` and `final_text` return a JSON envelope (`{"partial": ".."}`
/// or `{"text": ".."}`) or plain text; the evaluator accepts either.
pub trait Transcriber: Send {
    /// Forget any buffered audio and pending results.
    fn reset(&mut self);

    /// Push a chunk of PCM.  Returns `true` when a final result is ready.
    fn feed(&mut self, chunk: &[u8]) -> Result<bool, TranscriberError>;

    /// Current in-progress hypothesis.
    fn partial_text(&mut self) -> String;

    /// Take the final result produced by the last `feed` that returned `true`.
    fn final_text(&mut self) -> String;
}

// ---------------------------------------------------------------------------
// Sound cues
// ---------------------------------------------------------------------------

/// The audible cues played around an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundKind {
    Prompt,
    Success,
    Fail,
    Timeout,
}

impl SoundKind {
    pub const ALL: [SoundKind; 4] = [
        SoundKind::Prompt,
        SoundKind::Success,
        SoundKind::Fail,
        SoundKind::Timeout,
    ];

    /// File-name stem used for this cue, e.g. `prompt-0.mp3`.
    pub fn stem(self) -> &'static str {
        match self {
            SoundKind::Prompt => "prompt",
            SoundKind::Success => "success",
            SoundKind::Fail => "fail",
            SoundKind::Timeout => "timeout",
        }
    }
}

/// Plays a cue to completion.  Returns `false` when nothing was played;
/// playback failures never abort an evaluation.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, kind: SoundKind) -> bool;
}

// ---------------------------------------------------------------------------
// Unlock signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnlockError {
    #[error("unlock channel is not connected")]
    NotConnected,

    #[error("failed to publish unlock message: {0}")]
    Publish(String),
}

/// Fire-and-forget notification to the door hardware.
#[async_trait]
pub trait UnlockSignal: Send + Sync {
    async fn send_unlock(&self) -> Result<(), UnlockError>;
}
