//! Audio in and out: microphone capture, PCM helpers, energy VAD and cue
//! playback.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix → StreamResampler → s16le
//!           → MicrophoneStream::read (fixed chunks) → Transcriber
//!
//! SoundKind → CueLibrary::next (quiet hours, rotation) → decode_mp3 → cpal output
//! ```

pub mod capture;
pub mod pcm;
pub mod playback;
pub mod vad;

pub use capture::{CaptureError, MicrophoneInput, MicrophoneStream, TARGET_SAMPLE_RATE};
pub use pcm::{
    downmix, f32_to_pcm16le, i16_to_f32, pcm16le_to_f32, resample_clip, ResampleError,
    StreamResampler,
};
pub use playback::{decode_mp3, is_quiet_hour, Clip, CueLibrary, CuePlayer, PlaybackError};
pub use vad::{rms, EnergyGate, FRAME_SAMPLES};
