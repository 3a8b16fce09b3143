//! Scripted collaborators shared by the evaluator and dispatcher tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::clock::ManualClock;
use super::collaborators::{
    AudioInput, AudioSource, AudioSourceError, SoundKind, SoundPlayer, Transcriber,
    TranscriberError, UnlockError, UnlockSignal,
};

// ---------------------------------------------------------------------------
// ScriptedAudio
// ---------------------------------------------------------------------------

/// Audio input whose every read advances a [`ManualClock`] by one chunk.
pub struct ScriptedAudio {
    clock: Arc<ManualClock>,
    chunk: Duration,
    pub opens: Arc<AtomicUsize>,
    fail_open: bool,
    fail_after: Option<usize>,
    interrupt_after: Option<usize>,
    stalled: bool,
}

impl ScriptedAudio {
    pub fn new(clock: Arc<ManualClock>, chunk: Duration) -> Self {
        Self {
            clock,
            chunk,
            opens: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
            fail_after: None,
            interrupt_after: None,
            stalled: false,
        }
    }

    /// Every read times out with no data, as from a device that stopped
    /// delivering buffers.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }

    pub fn interrupted_after(mut self, reads: usize) -> Self {
        self.interrupt_after = Some(reads);
        self
    }
}

impl AudioInput for ScriptedAudio {
    fn open(&self) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(AudioSourceError::Unavailable("no such device".into()));
        }
        Ok(Box::new(ScriptedSource {
            clock: self.clock.clone(),
            chunk: self.chunk,
            reads: 0,
            fail_after: self.fail_after,
            interrupt_after: self.interrupt_after,
            stalled: self.stalled,
        }))
    }
}

struct ScriptedSource {
    clock: Arc<ManualClock>,
    chunk: Duration,
    reads: usize,
    fail_after: Option<usize>,
    interrupt_after: Option<usize>,
    stalled: bool,
}

impl AudioSource for ScriptedSource {
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioSourceError> {
        if self.fail_after == Some(self.reads) {
            return Err(AudioSourceError::Read("stream died".into()));
        }
        if self.interrupt_after == Some(self.reads) {
            return Err(AudioSourceError::Interrupted);
        }
        self.reads += 1;
        self.clock.advance(self.chunk);
        if self.stalled {
            return Ok(Vec::new());
        }
        Ok(vec![0u8; max_bytes])
    }
}

// ---------------------------------------------------------------------------
// ScriptedTranscriber
// ---------------------------------------------------------------------------

/// What the transcriber reports after one chunk.
#[derive(Debug, Clone)]
pub enum Step {
    Nothing,
    Partial(&'static str),
    Final(&'static str),
    /// A final whose payload is not valid JSON.
    Garbled,
    /// `feed` returns an error.
    Reject,
}

/// Transcriber that replays one script per evaluation.  Each `reset` loads
/// the next script; an exhausted script yields `Step::Nothing`.
pub struct ScriptedTranscriber {
    scripts: VecDeque<Vec<Step>>,
    current: VecDeque<Step>,
    partial: String,
    final_payload: String,
    pub resets: Arc<AtomicUsize>,
}

impl ScriptedTranscriber {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: scripts.into(),
            current: VecDeque::new(),
            partial: String::new(),
            final_payload: String::new(),
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Transcriber for ScriptedTranscriber {
    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.current = self.scripts.pop_front().unwrap_or_default().into();
        self.partial.clear();
        self.final_payload.clear();
    }

    fn feed(&mut self, _chunk: &[u8]) -> Result<bool, TranscriberError> {
        match self.current.pop_front().unwrap_or(Step::Nothing) {
            Step::Nothing => {
                self.partial.clear();
                Ok(false)
            }
            Step::Partial(text) => {
                self.partial = serde_json::json!({ "partial": text }).to_string();
                Ok(false)
            }
            Step::Final(text) => {
                self.final_payload = serde_json::json!({ "text": text }).to_string();
                Ok(true)
            }
            Step::Garbled => {
                self.final_payload = r#"{"text": "otev"#.to_string();
                Ok(true)
            }
            Step::Reject => Err(TranscriberError::Feed("bad chunk".into())),
        }
    }

    fn partial_text(&mut self) -> String {
        self.partial.clone()
    }

    fn final_text(&mut self) -> String {
        std::mem::take(&mut self.final_payload)
    }
}

// ---------------------------------------------------------------------------
// RecordingPlayer / RecordingUnlock
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingPlayer {
    pub played: Mutex<Vec<SoundKind>>,
}

impl RecordingPlayer {
    pub fn played(&self) -> Vec<SoundKind> {
        self.played.lock().unwrap().clone()
    }
}

impl SoundPlayer for RecordingPlayer {
    fn play(&self, kind: SoundKind) -> bool {
        self.played.lock().unwrap().push(kind);
        true
    }
}

#[derive(Default)]
pub struct RecordingUnlock {
    pub sent: AtomicUsize,
    pub fail: bool,
}

impl RecordingUnlock {
    pub fn count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnlockSignal for RecordingUnlock {
    async fn send_unlock(&self) -> Result<(), UnlockError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UnlockError::NotConnected);
        }
        Ok(())
    }
}
