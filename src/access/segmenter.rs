//! Speech segmentation: decides when the speaker has finished.
//!
//! The segmenter consumes [`TranscriptionEvent`]s and clock ticks and produces
//! exactly one [`SegmentationOutcome`] per run.
//!
//! ```text
//!  Idle ──first call──▶ Listening ──speech──▶ SpeechActive ◀──speech──┐
//!                          │                      │                   │
//!                          │                      └──tick──▶ Quiet ───┘
//!                          │                                  │
//!                          └────────────── timeout / sentence ┴──▶ Finished
//! ```
//!
//! Rules, checked on every tick in this order:
//!
//! 1. elapsed since the run started > `hard_timeout` → `HardTimeout`
//! 2. a final has arrived and the trailing silence > `silence_threshold`
//!    → `SentenceReady`
//! 3. speech was heard and the trailing silence >
//!    `silence_threshold + grace_extension` → `SentenceReady` with whatever
//!    finals were collected, or `SilenceTimeout` if there were none
//!
//! Before any speech is heard only the hard timeout applies.

use std::time::{Duration, Instant};

use super::types::{SegmentationOutcome, TranscriptionEvent, TranscriptionKind};

// ---------------------------------------------------------------------------
// SegmenterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// Upper bound on one listening run.
    pub hard_timeout: Duration,
    /// Trailing silence that ends a completed sentence.
    pub silence_threshold: Duration,
    /// Extra silence allowed when speech has not yet produced a final.
    pub grace_extension: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            hard_timeout: Duration::from_secs(15),
            silence_threshold: Duration::from_secs(2),
            grace_extension: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SegmenterState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Idle,
    Listening,
    SpeechActive,
    Quiet,
    Finished,
}

// ---------------------------------------------------------------------------
// SpeechSegmenter
// ---------------------------------------------------------------------------

/// One listening run.  Create a new segmenter for every evaluation.
#[derive(Debug)]
pub struct SpeechSegmenter {
    config: SegmenterConfig,
    state: SegmenterState,
    started_at: Option<Instant>,
    last_speech_at: Option<Instant>,
    sentence_complete: bool,
    finals: Vec<String>,
    outcome: Option<SegmentationOutcome>,
}

impl SpeechSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            state: SegmenterState::Idle,
            started_at: None,
            last_speech_at: None,
            sentence_complete: false,
            finals: Vec::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Whether any non-empty transcription has been observed.
    pub fn speech_detected(&self) -> bool {
        self.last_speech_at.is_some()
    }

    /// Record a transcription event, then evaluate the timing rules at the
    /// event's timestamp.
    ///
    /// Events with blank text only advance time.  A partial arriving after a
    /// final means the speaker kept talking, so the sentence is reopened.
    pub fn feed(&mut self, event: &TranscriptionEvent) -> Option<SegmentationOutcome> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        self.start(event.observed_at);

        let text = event.text.trim();
        if !text.is_empty() {
            self.last_speech_at = Some(event.observed_at);
            self.state = SegmenterState::SpeechActive;
            match event.kind {
                TranscriptionKind::Final => {
                    self.sentence_complete = true;
                    self.finals.push(text.to_string());
                }
                TranscriptionKind::Partial => self.sentence_complete = false,
            }
        }

        self.poll(event.observed_at)
    }

    /// Evaluate the timing rules at `now`.  The first call starts the run.
    ///
    /// Once an outcome has been produced the same outcome is returned on every
    /// later call.
    pub fn poll(&mut self, now: Instant) -> Option<SegmentationOutcome> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        let started_at = self.start(now);

        if now.saturating_duration_since(started_at) > self.config.hard_timeout {
            return self.finish(SegmentationOutcome::HardTimeout);
        }

        let Some(last_speech_at) = self.last_speech_at else {
            return None;
        };

        let silence = now.saturating_duration_since(last_speech_at);
        if silence > Duration::ZERO {
            self.state = SegmenterState::Quiet;
        }

        if self.sentence_complete && silence > self.config.silence_threshold {
            let sentence = self.sentence();
            return self.finish(SegmentationOutcome::SentenceReady(sentence));
        }

        if silence > self.config.silence_threshold + self.config.grace_extension {
            let outcome = if self.finals.is_empty() {
                SegmentationOutcome::SilenceTimeout
            } else {
                SegmentationOutcome::SentenceReady(self.sentence())
            };
            return self.finish(outcome);
        }

        None
    }

    fn start(&mut self, now: Instant) -> Instant {
        if self.state == SegmenterState::Idle {
            self.state = SegmenterState::Listening;
        }
        *self.started_at.get_or_insert(now)
    }

    fn sentence(&self) -> String {
        self.finals.join(" ")
    }

    fn finish(&mut self, outcome: SegmentationOutcome) -> Option<SegmentationOutcome> {
        log::debug!("segmenter: finished with {:?}", outcome);
        self.state = SegmenterState::Finished;
        self.outcome = Some(outcome);
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn segmenter() -> (SpeechSegmenter, Instant) {
        let mut seg = SpeechSegmenter::new(SegmenterConfig::default());
        let t0 = Instant::now();
        assert_eq!(seg.poll(t0), None);
        (seg, t0)
    }

    #[test]
    fn starts_idle_then_listens() {
        let mut seg = SpeechSegmenter::new(SegmenterConfig::default());
        assert_eq!(seg.state(), SegmenterState::Idle);
        seg.poll(Instant::now());
        assert_eq!(seg.state(), SegmenterState::Listening);
    }

    #[test]
    fn silence_before_speech_only_hits_hard_timeout() {
        let (mut seg, t0) = segmenter();
        assert_eq!(seg.poll(t0 + ms(14_900)), None);
        assert_eq!(seg.poll(t0 + ms(15_000)), None);
        assert_eq!(
            seg.poll(t0 + ms(15_001)),
            Some(SegmentationOutcome::HardTimeout)
        );
        assert_eq!(seg.state(), SegmenterState::Finished);
    }

    #[test]
    fn final_then_silence_yields_sentence() {
        let (mut seg, t0) = segmenter();
        let fin = TranscriptionEvent::final_result("otevři dveře", t0 + ms(1_000));
        assert_eq!(seg.feed(&fin), None);
        assert_eq!(seg.state(), SegmenterState::SpeechActive);

        assert_eq!(seg.poll(t0 + ms(3_000)), None);
        assert_eq!(seg.state(), SegmenterState::Quiet);
        assert_eq!(
            seg.poll(t0 + ms(3_100)),
            Some(SegmentationOutcome::SentenceReady("otevři dveře".into()))
        );
    }

    #[test]
    fn partial_only_times_out_after_grace() {
        let (mut seg, t0) = segmenter();
        seg.feed(&TranscriptionEvent::partial("otev", t0 + ms(500)));

        // Past the silence threshold but within the grace extension.
        assert_eq!(seg.poll(t0 + ms(3_000)), None);
        assert_eq!(seg.poll(t0 + ms(3_500)), None);
        assert_eq!(
            seg.poll(t0 + ms(3_600)),
            Some(SegmentationOutcome::SilenceTimeout)
        );
    }

    #[test]
    fn partial_after_final_reopens_sentence() {
        let (mut seg, t0) = segmenter();
        seg.feed(&TranscriptionEvent::final_result("otevři", t0 + ms(1_000)));
        seg.feed(&TranscriptionEvent::partial("dve", t0 + ms(1_500)));

        // 2.1 s after the partial the sentence is still open.
        assert_eq!(seg.poll(t0 + ms(3_600)), None);

        // Grace expiry falls back to the finals collected so far.
        assert_eq!(
            seg.poll(t0 + ms(4_600)),
            Some(SegmentationOutcome::SentenceReady("otevři".into()))
        );
    }

    #[test]
    fn multiple_finals_are_joined() {
        let (mut seg, t0) = segmenter();
        seg.feed(&TranscriptionEvent::final_result("otevři", t0 + ms(1_000)));
        seg.feed(&TranscriptionEvent::final_result("dveře", t0 + ms(2_000)));
        assert_eq!(
            seg.poll(t0 + ms(4_500)),
            Some(SegmentationOutcome::SentenceReady("otevři dveře".into()))
        );
    }

    #[test]
    fn hard_timeout_wins_over_ongoing_speech() {
        let (mut seg, t0) = segmenter();
        for i in 1..=15 {
            let out = seg.feed(&TranscriptionEvent::partial("bla", t0 + ms(i * 1_000)));
            assert_eq!(out, None);
        }
        assert_eq!(
            seg.feed(&TranscriptionEvent::partial("bla", t0 + ms(15_500))),
            Some(SegmentationOutcome::HardTimeout)
        );
    }

    #[test]
    fn blank_events_do_not_count_as_speech() {
        let (mut seg, t0) = segmenter();
        seg.feed(&TranscriptionEvent::partial("   ", t0 + ms(100)));
        assert!(!seg.speech_detected());
        assert_eq!(seg.poll(t0 + ms(5_000)), None);
    }

    #[test]
    fn outcome_is_sticky() {
        let (mut seg, t0) = segmenter();
        let first = seg.poll(t0 + ms(16_000));
        assert_eq!(first, Some(SegmentationOutcome::HardTimeout));
        let later = seg.feed(&TranscriptionEvent::final_result("x", t0 + ms(16_100)));
        assert_eq!(later, first);
    }

    #[test]
    fn custom_config_is_honoured() {
        let config = SegmenterConfig {
            hard_timeout: Duration::from_secs(3),
            silence_threshold: ms(500),
            grace_extension: ms(250),
        };
        let mut seg = SpeechSegmenter::new(config);
        let t0 = Instant::now();
        seg.feed(&TranscriptionEvent::final_result("ahoj", t0));
        assert_eq!(
            seg.poll(t0 + ms(501)),
            Some(SegmentationOutcome::SentenceReady("ahoj".into()))
        );
    }
}
