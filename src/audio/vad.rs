//! Energy-based voice activity gate.
//!
//! Audio is classified in 30 ms frames (480 samples at 16 kHz).  A frame is
//! voiced when its RMS amplitude exceeds the threshold.

/// 30 ms at 16 kHz.
pub const FRAME_SAMPLES: usize = 480;

/// Root-mean-square amplitude of `frame`; `0.0` when empty.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
    mean_sq.sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyGate {
    threshold: f32,
}

impl EnergyGate {
    /// `threshold` is an RMS level in `[0.0, 1.0]`.  `0.01` suits a quiet
    /// room; raise it toward `0.05` near a street.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_voiced(&self, frame: &[f32]) -> bool {
        rms(frame) > self.threshold
    }

    /// Classify `audio` frame by frame.  The last frame may be short.
    pub fn classify<'a>(&'a self, audio: &'a [f32]) -> impl Iterator<Item = (&'a [f32], bool)> + 'a {
        audio
            .chunks(FRAME_SAMPLES)
            .map(move |frame| (frame, self.is_voiced(frame)))
    }
}
