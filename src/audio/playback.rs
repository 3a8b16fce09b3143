//! Sound cues: file selection, MP3 decoding and blocking playback.
//!
//! Cue files live in one directory and are named after the cue kind:
//!
//! ```text
//! prompt-0.mp3  prompt-1.mp3  prompt-10pm-0.mp3
//! success-0.mp3 fail-0.mp3    timeout-0.mp3
//! ```
//!
//! Each kind cycles through its numbered variants.  Between 22:00 and 06:00
//! local time the `-10pm-` variants (quieter recordings) are preferred when
//! present.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Timelike;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use thiserror::Error;

use super::pcm::{downmix, i16_to_f32, resample_clip, ResampleError};
use crate::access::{SoundKind, SoundPlayer};

const QUIET_MARKER: &str = "10pm";

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot read cue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mp3 decode error: {0}")]
    Decode(String),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

// ---------------------------------------------------------------------------
// Quiet hours
// ---------------------------------------------------------------------------

/// 22:00 up to (not including) 06:00.
pub fn is_quiet_hour(hour: u32) -> bool {
    hour >= 22 || hour < 6
}

// ---------------------------------------------------------------------------
// CueLibrary
// ---------------------------------------------------------------------------

/// Picks the next file to play for each cue kind.
#[derive(Debug)]
pub struct CueLibrary {
    dir: PathBuf,
    force_quiet: bool,
    cursors: Mutex<HashMap<SoundKind, usize>>,
}

impl CueLibrary {
    pub fn new(dir: impl Into<PathBuf>, force_quiet: bool) -> Self {
        Self {
            dir: dir.into(),
            force_quiet,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Numbered variants of `kind` on disk, in numeric order.
    pub fn variants(&self, kind: SoundKind, quiet: bool) -> Vec<PathBuf> {
        let prefix = if quiet {
            format!("{}-{}-", kind.stem(), QUIET_MARKER)
        } else {
            format!("{}-", kind.stem())
        };

        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut numbered: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let index = name.strip_prefix(&prefix)?.strip_suffix(".mp3")?;
                let index: u32 = index.parse().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        numbered.sort_by_key(|(index, _)| *index);
        numbered.into_iter().map(|(_, path)| path).collect()
    }

    /// Next file for `kind` at local `hour`, advancing that kind's cursor.
    pub fn next(&self, kind: SoundKind, hour: u32) -> Option<PathBuf> {
        let quiet = self.force_quiet || is_quiet_hour(hour);
        let mut variants = if quiet {
            self.variants(kind, true)
        } else {
            Vec::new()
        };
        if variants.is_empty() {
            variants = self.variants(kind, false);
        }
        if variants.is_empty() {
            return None;
        }

        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let cursor = cursors.entry(kind).or_insert(0);
        let path = variants[*cursor % variants.len()].clone();
        *cursor = cursor.wrapping_add(1);
        Some(path)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A decoded cue, downmixed to mono.
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

pub fn decode_mp3(data: &[u8]) -> Result<Clip, PlaybackError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let channels = frame.channels.max(1) as u16;
                samples.extend(downmix(&i16_to_f32(&frame.data), channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(PlaybackError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(PlaybackError::Decode("no audio frames".into()));
    }
    Ok(Clip {
        samples,
        sample_rate,
    })
}

// ---------------------------------------------------------------------------
// CuePlayer
// ---------------------------------------------------------------------------

/// [`SoundPlayer`] that plays cue files on the default output device.
pub struct CuePlayer {
    library: CueLibrary,
}

impl CuePlayer {
    pub fn new(library: CueLibrary) -> Self {
        Self { library }
    }

    fn play_file(&self, path: &Path) -> Result<(), PlaybackError> {
        let data = std::fs::read(path).map_err(|source| PlaybackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let clip = decode_mp3(&data)?;
        log::debug!(
            "audio: playing {} ({:.1}s)",
            path.display(),
            clip.duration().as_secs_f32()
        );
        play_blocking(&clip)
    }
}

impl SoundPlayer for CuePlayer {
    fn play(&self, kind: SoundKind) -> bool {
        let hour = chrono::Local::now().hour();
        let Some(path) = self.library.next(kind, hour) else {
            log::warn!(
                "audio: no {} cue in {}",
                kind.stem(),
                self.library.dir().display()
            );
            return false;
        };
        match self.play_file(&path) {
            Ok(()) => true,
            Err(e) => {
                log::error!("audio: {}", e);
                false
            }
        }
    }
}

/// Play `clip` on the default output device and return once it has finished.
fn play_blocking(clip: &Clip) -> Result<(), PlaybackError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
    let supported = device.default_output_config()?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let samples = Arc::new(resample_clip(
        &clip.samples,
        clip.sample_rate,
        config.sample_rate.0,
    )?);
    let finished = Arc::new(AtomicBool::new(false));

    let (buf, done) = (samples.clone(), finished.clone());
    let stream = match format {
        cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, buf, done)?,
        cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, buf, done)?,
        cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, buf, done)?,
        other => return Err(PlaybackError::UnsupportedFormat(other)),
    };
    stream.play()?;

    let deadline = Instant::now() + clip.duration() + Duration::from_millis(500);
    while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    // Let the device drain its last buffer.
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut position = 0usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = samples.get(position).copied().unwrap_or(0.0);
                position = position.saturating_add(1);
                for out in frame.iter_mut() {
                    *out = value.to_sample::<T>();
                }
            }
            if position >= samples.len() {
                finished.store(true, Ordering::Release);
            }
        },
        |err: cpal::StreamError| log::error!("audio: playback stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
