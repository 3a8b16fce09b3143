//! Microphone capture via `cpal`.
//!
//! [`MicrophoneInput`] opens the configured input device once per evaluation.
//! The cpal callback converts every hardware buffer to 16 kHz mono s16le and
//! forwards it over a std channel; [`MicrophoneStream::read`] reassembles the
//! requested chunk size on the evaluation thread.  Dropping the stream stops
//! the hardware.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use thiserror::Error;

use super::pcm::{downmix, f32_to_pcm16le, ResampleError, StreamResampler};
use crate::access::{AudioInput, AudioSource, AudioSourceError, Shutdown};

/// Output rate handed to the recogniser.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// How often a blocked read re-checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type ChunkResult = Result<Vec<u8>, String>;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Resample(#[from] ResampleError),
}

impl From<CaptureError> for AudioSourceError {
    fn from(e: CaptureError) -> Self {
        AudioSourceError::Unavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// MicrophoneInput
// ---------------------------------------------------------------------------

/// Opens a fresh capture stream for each evaluation.
pub struct MicrophoneInput {
    device_name: Option<String>,
    target_rate: u32,
    shutdown: Shutdown,
}

impl MicrophoneInput {
    /// `device_name` selects an input by its cpal name; `None` uses the
    /// host default.
    pub fn new(device_name: Option<String>, shutdown: Shutdown) -> Self {
        Self {
            device_name,
            target_rate: TARGET_SAMPLE_RATE,
            shutdown,
        }
    }

    pub fn with_target_rate(mut self, rate: u32) -> Self {
        self.target_rate = rate;
        self
    }

    fn select_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        match &self.device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().is_ok_and(|name| &name == wanted))
                .ok_or_else(|| CaptureError::DeviceNotFound(wanted.clone())),
        }
    }

    /// Open the device and start streaming.
    pub fn start(&self) -> Result<MicrophoneStream, CaptureError> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let supported = device.default_input_config()?;

        let format = supported.sample_format();
        let channels = supported.channels();
        let source_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "audio: capturing from {} ({} Hz, {} ch, {:?})",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            source_rate,
            channels,
            format
        );

        let (tx, rx) = mpsc::channel::<ChunkResult>();
        let convert = Converter::new(channels, source_rate, self.target_rate)?;

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, convert, tx)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, convert, tx)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, convert, tx)?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        stream.play()?;

        Ok(MicrophoneStream {
            _stream: stream,
            reader: ChunkReader::new(rx, self.shutdown.clone(), self.target_rate),
        })
    }
}

impl AudioInput for MicrophoneInput {
    fn open(&self) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        if self.shutdown.is_triggered() {
            return Err(AudioSourceError::Interrupted);
        }
        Ok(Box::new(self.start()?))
    }
}

/// Per-stream conversion state.  The resampler keeps its phase between
/// callbacks, so buffer boundaries leave no trace in the output.
struct Converter {
    channels: u16,
    resampler: StreamResampler,
}

impl Converter {
    fn new(channels: u16, source_rate: u32, target_rate: u32) -> Result<Self, ResampleError> {
        Ok(Self {
            channels,
            resampler: StreamResampler::new(source_rate, target_rate)?,
        })
    }

    fn convert<T>(&mut self, data: &[T]) -> Result<Vec<u8>, ResampleError>
    where
        T: cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        let samples: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
        let mono = downmix(&samples, self.channels);
        Ok(f32_to_pcm16le(&self.resampler.process(&mono)?))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut converter: Converter,
    tx: mpsc::Sender<ChunkResult>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_tx = tx.clone();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // The receiver is gone once the evaluation has finished.
            let _ = tx.send(converter.convert(data).map_err(|e| e.to_string()));
        },
        move |err: cpal::StreamError| {
            log::error!("audio: capture stream error: {err}");
            let _ = err_tx.send(Err(err.to_string()));
        },
        None,
    )?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// MicrophoneStream
// ---------------------------------------------------------------------------

/// An open capture stream.  Not `Send`: cpal streams are tied to the thread
/// that built them on some hosts.
pub struct MicrophoneStream {
    _stream: cpal::Stream,
    reader: ChunkReader,
}

impl AudioSource for MicrophoneStream {
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioSourceError> {
        self.reader.read(max_bytes)
    }
}

/// Reassembles fixed-size reads from the callback's variable-size buffers.
///
/// A read never waits longer than [`ChunkReader::stall_window`]: a device
/// that stays open but stops delivering callbacks yields short (possibly
/// empty) chunks instead of blocking the caller, so the evaluator's
/// timeouts keep running.
struct ChunkReader {
    rx: mpsc::Receiver<ChunkResult>,
    pending: Vec<u8>,
    shutdown: Shutdown,
    bytes_per_second: u64,
}

impl ChunkReader {
    fn new(rx: mpsc::Receiver<ChunkResult>, shutdown: Shutdown, sample_rate: u32) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            shutdown,
            bytes_per_second: sample_rate.max(1) as u64 * 2,
        }
    }

    /// Twice the real-time length of `max_bytes`, never below one poll.
    fn stall_window(&self, max_bytes: usize) -> Duration {
        let period = Duration::from_micros(max_bytes as u64 * 1_000_000 / self.bytes_per_second);
        (period * 2).max(POLL_INTERVAL)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioSourceError> {
        let max_bytes = max_bytes.max(2);
        let deadline = Instant::now() + self.stall_window(max_bytes);
        loop {
            if self.pending.len() >= max_bytes {
                let rest = self.pending.split_off(max_bytes);
                return Ok(std::mem::replace(&mut self.pending, rest));
            }
            if self.shutdown.is_triggered() {
                return Err(AudioSourceError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                if self.pending.is_empty() {
                    log::debug!("audio: no capture data for {:?}", self.stall_window(max_bytes));
                }
                return Ok(std::mem::take(&mut self.pending));
            }
            match self.rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(Ok(bytes)) => self.pending.extend_from_slice(&bytes),
                Ok(Err(message)) => return Err(AudioSourceError::Read(message)),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(AudioSourceError::Read("capture stream closed".into()));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
