//! Serialises triggers into evaluations and applies their side effects.
//!
//! A single async task owns the [`AccessEvaluator`].  Each trigger runs one
//! blocking evaluation on the tokio blocking pool; triggers that arrive while
//! an evaluation (or its closing cue) is in progress are dropped, never queued.
//!
//! ```text
//!  hotkey ──┐
//!  button ──┼──▶ mpsc<Trigger> ──▶ Dispatcher::run ──spawn_blocking──▶ evaluate()
//!  manual ──┘                            │
//!                                        ├──▶ cue (success / fail / timeout)
//!                                        ├──▶ UnlockSignal on success
//!                                        └──▶ mpsc<EvaluationVerdict> (optional)
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use super::collaborators::{SoundKind, SoundPlayer, UnlockSignal};
use super::evaluator::AccessEvaluator;
use super::shutdown::Shutdown;
use super::types::{EvaluationVerdict, Trigger};

pub struct Dispatcher {
    evaluator: AccessEvaluator,
    player: Arc<dyn SoundPlayer>,
    unlock: Arc<dyn UnlockSignal>,
    verdict_tx: Option<mpsc::Sender<EvaluationVerdict>>,
    shutdown: Shutdown,
}

impl Dispatcher {
    pub fn new(
        evaluator: AccessEvaluator,
        player: Arc<dyn SoundPlayer>,
        unlock: Arc<dyn UnlockSignal>,
    ) -> Self {
        Self {
            evaluator,
            player,
            unlock,
            verdict_tx: None,
            shutdown: Shutdown::new(),
        }
    }

    /// Share the process shutdown handle.  The same handle should be given
    /// to the evaluator so an in-flight evaluation is interrupted too.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Report every verdict on `tx` after its side effects have run.
    pub fn with_verdicts(mut self, tx: mpsc::Sender<EvaluationVerdict>) -> Self {
        self.verdict_tx = Some(tx);
        self
    }

    /// Process triggers until the channel closes or shutdown is requested.
    ///
    /// A panicking evaluation triggers the shared [`Shutdown`] so the rest of
    /// the process stops too.
    pub async fn run(self, mut trigger_rx: mpsc::Receiver<Trigger>) {
        let Dispatcher {
            mut evaluator,
            player,
            unlock,
            verdict_tx,
            shutdown,
        } = self;

        log::info!("dispatcher: ready");

        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = trigger_rx.recv() => match next {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            let handle = tokio::task::spawn_blocking(move || {
                let outcome = evaluator.evaluate(trigger);
                (evaluator, outcome)
            });
            let outcome = match handle.await {
                Ok((returned, outcome)) => {
                    evaluator = returned;
                    outcome
                }
                Err(e) => {
                    // The evaluator went down with the task; nothing can
                    // serve further triggers.
                    log::error!("dispatcher: evaluation task failed: {}, shutting down", e);
                    shutdown.trigger();
                    break;
                }
            };

            let verdict = match outcome {
                Ok(verdict) => verdict,
                Err(cancelled) => {
                    log::info!("dispatcher: {}", cancelled);
                    break;
                }
            };
            log::info!("dispatcher: verdict {}", verdict);

            apply_verdict(&verdict, &player, unlock.as_ref()).await;

            let dropped = drain(&mut trigger_rx);
            if dropped > 0 {
                log::info!("dispatcher: dropped {} trigger(s) received while busy", dropped);
            }

            if let Some(tx) = &verdict_tx {
                let _ = tx.send(verdict).await;
            }
        }

        log::info!("dispatcher: stopped");
    }
}

/// Play the closing cue for `verdict` and, on success, signal the door.
async fn apply_verdict(
    verdict: &EvaluationVerdict,
    player: &Arc<dyn SoundPlayer>,
    unlock: &dyn UnlockSignal,
) {
    if verdict.is_success() {
        match unlock.send_unlock().await {
            Ok(()) => log::info!("dispatcher: unlock signal sent"),
            Err(e) => log::error!("dispatcher: {}", e),
        }
    }

    let cue = match verdict {
        EvaluationVerdict::Success(_) => SoundKind::Success,
        EvaluationVerdict::Failed | EvaluationVerdict::Locked(_) => SoundKind::Fail,
        EvaluationVerdict::Timeout => SoundKind::Timeout,
    };
    let player = Arc::clone(player);
    if let Err(e) = tokio::task::spawn_blocking(move || player.play(cue)).await {
        log::warn!("dispatcher: cue playback task failed: {}", e);
    }
}

/// Discard every trigger already queued.
fn drain(rx: &mut mpsc::Receiver<Trigger>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
