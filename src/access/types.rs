//! Value types passed between the access-decision components.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

// ---------------------------------------------------------------------------
// TranscriptionEvent
// ---------------------------------------------------------------------------

/// Whether a transcription result is still evolving or settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionKind {
    /// In-progress hypothesis for the current utterance; may change.
    Partial,
    /// Stable result that closes the current utterance segment.
    Final,
}

/// One normalised, non-empty piece of recognised text.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionEvent {
    pub kind: TranscriptionKind,
    pub text: String,
    pub observed_at: Instant,
}

impl TranscriptionEvent {
    pub fn partial(text: impl Into<String>, observed_at: Instant) -> Self {
        Self {
            kind: TranscriptionKind::Partial,
            text: text.into(),
            observed_at,
        }
    }

    pub fn final_result(text: impl Into<String>, observed_at: Instant) -> Self {
        Self {
            kind: TranscriptionKind::Final,
            text: text.into(),
            observed_at,
        }
    }

    pub fn is_final(&self) -> bool {
        self.kind == TranscriptionKind::Final
    }
}

// ---------------------------------------------------------------------------
// SegmentationOutcome
// ---------------------------------------------------------------------------

/// Terminal result of one [`SpeechSegmenter`](super::SpeechSegmenter) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentationOutcome {
    /// Speech ended with a final transcript.
    SentenceReady(String),
    /// Speech was heard but never produced a final transcript.
    SilenceTimeout,
    /// The overall listening window ran out.
    HardTimeout,
}

// ---------------------------------------------------------------------------
// EvaluationVerdict
// ---------------------------------------------------------------------------

/// Externally visible result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationVerdict {
    /// The spoken phrase matched this stored passphrase.
    Success(String),
    /// Wrong phrase, or the audio device failed.
    Failed,
    /// Nothing usable was said in time.  Not counted as an attempt.
    Timeout,
    /// Too many recent failures; try again after `remaining`.
    Locked(Duration),
}

impl EvaluationVerdict {
    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationVerdict::Success(_))
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            EvaluationVerdict::Success(_) => "success",
            EvaluationVerdict::Failed => "failed",
            EvaluationVerdict::Timeout => "timeout",
            EvaluationVerdict::Locked(_) => "locked",
        }
    }
}

impl fmt::Display for EvaluationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationVerdict::Locked(remaining) => {
                write!(f, "locked ({}s remaining)", remaining.as_secs_f32().ceil())
            }
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger / Cancelled
// ---------------------------------------------------------------------------

/// What started an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Physical push button.  Nothing in this crate produces it; it is
    /// for embedders that bridge a door button (GPIO, MQTT) into the
    /// trigger channel.
    Button,
    /// Global keyboard hotkey.
    Hotkey,
    /// Programmatic call (tests, CLI, timers).
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Button => "button",
            Trigger::Hotkey => "hotkey",
            Trigger::Manual => "manual",
        })
    }
}

/// The evaluation was abandoned because the process is shutting down.
///
/// No verdict is produced and the attempt policy is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("evaluation cancelled by shutdown")]
pub struct Cancelled;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_labels() {
        assert_eq!(EvaluationVerdict::Success("x".into()).label(), "success");
        assert_eq!(EvaluationVerdict::Failed.label(), "failed");
        assert_eq!(EvaluationVerdict::Timeout.label(), "timeout");
        assert_eq!(EvaluationVerdict::Locked(Duration::ZERO).label(), "locked");
    }

    #[test]
    fn locked_display_rounds_up_seconds() {
        let v = EvaluationVerdict::Locked(Duration::from_millis(29_200));
        assert_eq!(v.to_string(), "locked (30s remaining)");
    }

    #[test]
    fn event_constructors_set_kind() {
        let now = Instant::now();
        assert!(TranscriptionEvent::final_result("a", now).is_final());
        assert!(!TranscriptionEvent::partial("a", now).is_final());
    }

    #[test]
    fn cancelled_is_a_boxable_error() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(Cancelled);
        assert_eq!(err.to_string(), "evaluation cancelled by shutdown");
        assert_eq!(Trigger::Button.to_string(), "button");
    }
}
