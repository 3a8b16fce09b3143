//! The access decision engine.
//!
//! # Architecture
//!
//! ```text
//!  Trigger ──▶ Dispatcher ──▶ AccessEvaluator
//!                                 │
//!                 ┌───────────────┼────────────────┬──────────────┐
//!                 ▼               ▼                ▼              ▼
//!            AudioInput      Transcriber     SpeechSegmenter  AttemptPolicy
//!                                                 │
//!                                                 ▼
//!                                          passphrase::match_candidate
//! ```
//!
//! Hardware and network access go through the traits in [`collaborators`];
//! everything else in this module is deterministic given a [`Clock`].

pub mod clock;
pub mod collaborators;
pub mod dispatcher;
pub mod envelope;
pub mod evaluator;
pub mod policy;
pub mod segmenter;
pub mod shutdown;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use clock::{Clock, SystemClock};
pub use collaborators::{
    AudioInput, AudioSource, AudioSourceError, SoundKind, SoundPlayer, Transcriber,
    TranscriberError, UnlockError, UnlockSignal,
};
pub use dispatcher::Dispatcher;
pub use envelope::{extract_text, EnvelopeError};
pub use evaluator::{AccessEvaluator, Collaborators, EvaluatorConfig};
pub use policy::{AttemptPolicy, AttemptState, PolicyConfig};
pub use segmenter::{SegmenterConfig, SegmenterState, SpeechSegmenter};
pub use shutdown::Shutdown;
pub use types::{
    Cancelled, EvaluationVerdict, SegmentationOutcome, Trigger, TranscriptionEvent,
    TranscriptionKind,
};
