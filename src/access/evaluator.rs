//! One end-to-end access decision: prompt, listen, segment, match, account.
//!
//! [`AccessEvaluator::evaluate`] is blocking.  It owns the audio source for
//! the duration of the call and releases it on every exit path, including
//! cancellation.
//!
//! ```text
//!  trigger
//!     │
//!     ▼
//!  locked? ──yes──▶ Locked(remaining)
//!     │no
//!     ▼
//!  reset transcriber → prompt cue → settle → open mic
//!     │
//!     ▼
//!  ┌─ read chunk ─▶ transcriber ─▶ final? ──yes──▶ match ─▶ Success / Failed
//!  │                    │no
//!  │                    ▼
//!  │              segmenter tick ─▶ SilenceTimeout / HardTimeout ─▶ Timeout
//!  └────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;
use super::collaborators::{AudioInput, AudioSourceError, SoundKind, SoundPlayer, Transcriber};
use super::envelope::extract_text;
use super::policy::AttemptPolicy;
use super::segmenter::{SegmenterConfig, SpeechSegmenter};
use super::shutdown::Shutdown;
use super::types::{
    Cancelled, EvaluationVerdict, SegmentationOutcome, TranscriptionEvent, TranscriptionKind,
    Trigger,
};
use crate::passphrase::{match_candidate, normalize, PassphraseError, PassphraseStore};

// ---------------------------------------------------------------------------
// EvaluatorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorConfig {
    pub segmenter: SegmenterConfig,
    /// Pause between the prompt cue and opening the microphone, so the cue
    /// is not captured.
    pub settle_delay: Duration,
    /// Bytes requested per audio read (16 kHz s16le: 8 000 bytes = 250 ms).
    pub chunk_bytes: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            settle_delay: Duration::from_millis(500),
            chunk_bytes: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Everything the evaluator needs from outside the decision logic.
pub struct Collaborators {
    pub audio: Arc<dyn AudioInput>,
    pub transcriber: Box<dyn Transcriber>,
    pub player: Arc<dyn SoundPlayer>,
    pub clock: Arc<dyn Clock>,
}

// ---------------------------------------------------------------------------
// AccessEvaluator
// ---------------------------------------------------------------------------

pub struct AccessEvaluator {
    config: EvaluatorConfig,
    store: PassphraseStore,
    policy: AttemptPolicy,
    audio: Arc<dyn AudioInput>,
    transcriber: Box<dyn Transcriber>,
    player: Arc<dyn SoundPlayer>,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
}

impl AccessEvaluator {
    /// Build an evaluator.  Refuses to start with an empty passphrase list.
    pub fn new(
        config: EvaluatorConfig,
        store: PassphraseStore,
        policy: AttemptPolicy,
        collaborators: Collaborators,
    ) -> Result<Self, PassphraseError> {
        if store.is_empty() {
            return Err(PassphraseError::Empty(store.path().display().to_string()));
        }
        Ok(Self {
            config,
            store,
            policy,
            audio: collaborators.audio,
            transcriber: collaborators.transcriber,
            player: collaborators.player,
            clock: collaborators.clock,
            shutdown: Shutdown::new(),
        })
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn store(&self) -> &PassphraseStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PassphraseStore {
        &mut self.store
    }

    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    /// Run one evaluation to completion.
    ///
    /// Returns `Err(Cancelled)` only when shutdown interrupts the listening
    /// loop; in that case the attempt policy is not touched.
    pub fn evaluate(&mut self, trigger: Trigger) -> Result<EvaluationVerdict, Cancelled> {
        if let Some(remaining) = self.policy.check_lockout(self.clock.now()) {
            log::warn!(
                "access: {} trigger ignored, locked for {:.1}s",
                trigger,
                remaining.as_secs_f32()
            );
            return Ok(EvaluationVerdict::Locked(remaining));
        }

        log::info!("access: {} trigger, listening for passphrase", trigger);
        self.transcriber.reset();

        if !self.player.play(SoundKind::Prompt) {
            log::debug!("access: no prompt cue played");
        }
        if !self.config.settle_delay.is_zero() {
            self.clock.sleep(self.config.settle_delay);
        }
        if self.shutdown.is_triggered() {
            return Err(Cancelled);
        }

        let mut source = match self.audio.open() {
            Ok(source) => source,
            Err(AudioSourceError::Interrupted) => return Err(Cancelled),
            Err(e) => return Ok(self.device_failure(e)),
        };

        let mut segmenter = SpeechSegmenter::new(self.config.segmenter);
        segmenter.poll(self.clock.now());

        loop {
            if self.shutdown.is_triggered() {
                log::info!("access: shutdown during evaluation");
                return Err(Cancelled);
            }

            let chunk = match source.read(self.config.chunk_bytes) {
                Ok(chunk) => chunk,
                Err(AudioSourceError::Interrupted) => return Err(Cancelled),
                Err(e) => return Ok(self.device_failure(e)),
            };
            let now = self.clock.now();

            match self.transcriber.feed(&chunk) {
                Ok(true) => {
                    if let Some(text) = self.take_text(TranscriptionKind::Final) {
                        log::debug!("access: heard \"{}\"", text);
                        segmenter.feed(&TranscriptionEvent::final_result(text.clone(), now));
                        return Ok(self.decide(&text, now));
                    }
                }
                Ok(false) => {
                    if let Some(text) = self.take_text(TranscriptionKind::Partial) {
                        log::debug!("access: partial \"{}\"", text);
                        segmenter.feed(&TranscriptionEvent::partial(text, now));
                    }
                }
                Err(e) => log::warn!("access: dropping audio chunk: {}", e),
            }

            match segmenter.poll(now) {
                None => {}
                Some(SegmentationOutcome::SentenceReady(text)) => {
                    return Ok(self.decide(&text, now));
                }
                Some(outcome @ SegmentationOutcome::SilenceTimeout)
                | Some(outcome @ SegmentationOutcome::HardTimeout) => {
                    log::info!("access: no passphrase heard ({:?})", outcome);
                    return Ok(EvaluationVerdict::Timeout);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Pull the current result from the transcriber, decode and normalise it.
    fn take_text(&mut self, kind: TranscriptionKind) -> Option<String> {
        let raw = match kind {
            TranscriptionKind::Final => self.transcriber.final_text(),
            TranscriptionKind::Partial => self.transcriber.partial_text(),
        };
        match extract_text(&raw) {
            Ok(Some(text)) => normalize(&text, self.store.case_sensitive()),
            Ok(None) => None,
            Err(e) => {
                log::warn!("access: ignoring transcriber result: {}", e);
                None
            }
        }
    }

    fn decide(&mut self, text: &str, now: Instant) -> EvaluationVerdict {
        let result = match_candidate(text, self.store.as_slice());
        match (result.matched, result.passphrase) {
            (true, Some(passphrase)) => {
                log::info!(
                    "access: accepted via {} match",
                    result.strategy.map(|s| s.label()).unwrap_or("unknown")
                );
                self.policy.record_success();
                EvaluationVerdict::Success(passphrase)
            }
            _ => {
                log::info!("access: phrase rejected");
                log::debug!("access: rejected \"{}\"", text);
                self.policy.record_failure(now);
                EvaluationVerdict::Failed
            }
        }
    }

    fn device_failure(&mut self, error: AudioSourceError) -> EvaluationVerdict {
        log::error!("access: audio device error: {}", error);
        self.policy.record_failure(self.clock.now());
        EvaluationVerdict::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::clock::ManualClock;
    use crate::access::policy::PolicyConfig;
    use crate::access::testing::{RecordingPlayer, ScriptedAudio, ScriptedTranscriber, Step};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHUNK: Duration = Duration::from_millis(500);

    struct Harness {
        evaluator: AccessEvaluator,
        clock: Arc<ManualClock>,
        opens: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
        player: Arc<RecordingPlayer>,
    }

    fn store(phrases: &[&str]) -> PassphraseStore {
        PassphraseStore::from_phrases("unused.txt", phrases.iter().copied(), false)
    }

    fn config() -> EvaluatorConfig {
        EvaluatorConfig {
            settle_delay: Duration::ZERO,
            ..EvaluatorConfig::default()
        }
    }

    fn harness_with(
        phrases: &[&str],
        policy: PolicyConfig,
        scripts: Vec<Vec<Step>>,
        audio: impl FnOnce(ScriptedAudio) -> ScriptedAudio,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let audio = audio(ScriptedAudio::new(clock.clone(), CHUNK));
        let opens = audio.opens.clone();
        let transcriber = ScriptedTranscriber::new(scripts);
        let resets = transcriber.resets.clone();
        let player = Arc::new(RecordingPlayer::default());

        let evaluator = AccessEvaluator::new(
            config(),
            store(phrases),
            AttemptPolicy::new(policy),
            Collaborators {
                audio: Arc::new(audio),
                transcriber: Box::new(transcriber),
                player: player.clone(),
                clock: clock.clone(),
            },
        )
        .unwrap();

        Harness {
            evaluator,
            clock,
            opens,
            resets,
            player,
        }
    }

    fn harness(phrases: &[&str], scripts: Vec<Vec<Step>>) -> Harness {
        harness_with(phrases, PolicyConfig::default(), scripts, |a| a)
    }

    #[test]
    fn partial_then_final_succeeds_via_first_stored_match() {
        // "otevři" precedes "otevři dveře" in the list, so containment on the
        // first entry wins.
        let mut h = harness(
            &["otevři", "otevři dveře"],
            vec![vec![
                Step::Nothing,
                Step::Partial("otev"),
                Step::Nothing,
                Step::Nothing,
                Step::Nothing,
                Step::Final("otevři dveře prosím"),
            ]],
        );

        let verdict = h.evaluator.evaluate(Trigger::Button).unwrap();
        assert_eq!(verdict, EvaluationVerdict::Success("otevři".into()));
        assert_eq!(h.clock.elapsed(), Duration::from_secs(3));
        assert_eq!(h.evaluator.policy().state().failed_count, 0);
        assert_eq!(h.player.played(), vec![SoundKind::Prompt]);
    }

    #[test]
    fn exact_phrase_succeeds() {
        let mut h = harness(&["sezame otevři se"], vec![vec![Step::Final("Sezame  otevři se")]]);
        assert_eq!(
            h.evaluator.evaluate(Trigger::Hotkey).unwrap(),
            EvaluationVerdict::Success("sezame otevři se".into())
        );
    }

    #[test]
    fn wrong_phrase_fails_immediately() {
        let mut h = harness(
            &["otevři dveře"],
            vec![vec![Step::Nothing, Step::Final("dobrý den")]],
        );
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Failed
        );
        assert_eq!(h.clock.elapsed(), Duration::from_secs(1));
        assert_eq!(h.evaluator.policy().state().failed_count, 1);
    }

    #[test]
    fn silence_hits_hard_timeout_without_penalty() {
        let mut h = harness(&["otevři dveře"], vec![vec![]]);
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Timeout
        );
        assert!(h.clock.elapsed() > Duration::from_secs(15));
        assert!(h.clock.elapsed() <= Duration::from_millis(15_500));
        assert_eq!(h.evaluator.policy().state().failed_count, 0);
    }

    #[test]
    fn stalled_microphone_still_ends_at_hard_timeout() {
        let mut h = harness_with(
            &["otevři dveře"],
            PolicyConfig::default(),
            vec![vec![]],
            ScriptedAudio::stalled,
        );
        assert_eq!(
            h.evaluator.evaluate(Trigger::Hotkey).unwrap(),
            EvaluationVerdict::Timeout
        );
        assert!(h.clock.elapsed() <= Duration::from_millis(15_500));
        assert_eq!(h.evaluator.policy().state().failed_count, 0);
    }

    #[test]
    fn partial_without_final_hits_silence_timeout() {
        let mut h = harness(&["otevři dveře"], vec![vec![Step::Partial("ote")]]);
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Timeout
        );
        // Partial at 0.5 s, silence must exceed 3 s: resolved at 4.0 s.
        assert_eq!(h.clock.elapsed(), Duration::from_secs(4));
        assert_eq!(h.evaluator.policy().state().failed_count, 0);
    }

    #[test]
    fn empty_finals_are_ignored() {
        let mut h = harness(
            &["otevři dveře"],
            vec![vec![Step::Final(""), Step::Final("  "), Step::Final("otevři dveře")]],
        );
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Success("otevři dveře".into())
        );
    }

    #[test]
    fn unknown_word_markers_are_stripped_before_matching() {
        let mut h = harness(&["otevři dveře"], vec![vec![Step::Final("[unk] otevři [unk] dveře")]]);
        assert!(h.evaluator.evaluate(Trigger::Button).unwrap().is_success());
    }

    #[test]
    fn malformed_results_and_rejected_chunks_are_skipped() {
        let mut h = harness(
            &["otevři dveře"],
            vec![vec![Step::Garbled, Step::Reject, Step::Final("otevři dveře")]],
        );
        assert!(h.evaluator.evaluate(Trigger::Button).unwrap().is_success());
        assert_eq!(h.clock.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn lockout_after_max_failures_then_expires() {
        let policy = PolicyConfig {
            max_attempts: 3,
            lockout_duration: Duration::from_secs(30),
        };
        let wrong = || vec![Step::Final("dobrý den")];
        let mut h = harness_with(
            &["otevři dveře"],
            policy,
            vec![wrong(), wrong(), wrong(), vec![Step::Final("otevři dveře")]],
            |a| a,
        );

        for _ in 0..3 {
            assert_eq!(
                h.evaluator.evaluate(Trigger::Button).unwrap(),
                EvaluationVerdict::Failed
            );
        }

        let verdict = h.evaluator.evaluate(Trigger::Button).unwrap();
        match verdict {
            EvaluationVerdict::Locked(remaining) => {
                assert!(remaining <= Duration::from_secs(30));
                assert!(remaining > Duration::from_secs(29));
            }
            other => panic!("expected Locked, got {other:?}"),
        }
        // A locked evaluation touches neither the microphone nor the recogniser.
        assert_eq!(h.opens.load(Ordering::SeqCst), 3);
        assert_eq!(h.resets.load(Ordering::SeqCst), 3);
        assert_eq!(h.player.played().len(), 3);

        h.clock.advance(Duration::from_secs(30));
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Success("otevři dveře".into())
        );
        assert_eq!(h.evaluator.policy().state().failed_count, 0);
    }

    #[test]
    fn timeouts_do_not_accumulate_toward_lockout() {
        let policy = PolicyConfig {
            max_attempts: 1,
            lockout_duration: Duration::from_secs(30),
        };
        let mut h = harness_with(&["otevři dveře"], policy, vec![vec![], vec![]], |a| a);
        assert_eq!(h.evaluator.evaluate(Trigger::Button).unwrap(), EvaluationVerdict::Timeout);
        assert_eq!(h.evaluator.evaluate(Trigger::Button).unwrap(), EvaluationVerdict::Timeout);
    }

    #[test]
    fn device_open_failure_counts_as_failed_attempt() {
        let mut h = harness_with(
            &["otevři dveře"],
            PolicyConfig::default(),
            vec![vec![]],
            ScriptedAudio::failing_open,
        );
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Failed
        );
        assert_eq!(h.evaluator.policy().state().failed_count, 1);
    }

    #[test]
    fn read_failure_mid_stream_counts_as_failed_attempt() {
        let mut h = harness_with(
            &["otevři dveře"],
            PolicyConfig::default(),
            vec![vec![Step::Partial("ote")]],
            |a| a.failing_after(2),
        );
        assert_eq!(
            h.evaluator.evaluate(Trigger::Button).unwrap(),
            EvaluationVerdict::Failed
        );
        assert_eq!(h.evaluator.policy().state().failed_count, 1);
    }

    #[test]
    fn interrupted_read_cancels_without_penalty() {
        let mut h = harness_with(
            &["otevři dveře"],
            PolicyConfig::default(),
            vec![vec![]],
            |a| a.interrupted_after(1),
        );
        assert_eq!(h.evaluator.evaluate(Trigger::Button), Err(Cancelled));
        assert_eq!(h.evaluator.policy().state(), Default::default());
    }

    #[test]
    fn shutdown_before_listening_cancels() {
        let shutdown = Shutdown::new();
        let h = harness(&["otevři dveře"], vec![vec![Step::Final("otevři dveře")]]);
        let mut evaluator = h.evaluator.with_shutdown(shutdown.clone());
        shutdown.trigger();
        assert_eq!(evaluator.evaluate(Trigger::Button), Err(Cancelled));
        assert_eq!(h.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn settle_delay_precedes_listening() {
        let mut h = harness(&["otevři dveře"], vec![vec![Step::Final("otevři dveře")]]);
        h.evaluator.config.settle_delay = Duration::from_millis(500);
        h.evaluator.evaluate(Trigger::Button).unwrap();
        assert_eq!(h.clock.elapsed(), Duration::from_millis(1_000));
    }

    #[test]
    fn empty_store_is_refused() {
        let clock = Arc::new(ManualClock::new());
        let result = AccessEvaluator::new(
            config(),
            store(&[]),
            AttemptPolicy::new(PolicyConfig::default()),
            Collaborators {
                audio: Arc::new(ScriptedAudio::new(clock.clone(), CHUNK)),
                transcriber: Box::new(ScriptedTranscriber::new(vec![])),
                player: Arc::new(RecordingPlayer::default()),
                clock,
            },
        );
        assert!(matches!(result, Err(PassphraseError::Empty(_))));
    }
}
