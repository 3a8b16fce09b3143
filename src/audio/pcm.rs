//! Sample-format conversions between cpal, the recogniser and the speaker.
//!
//! Capture path: interleaved f32 at the device rate → [`downmix`] →
//! [`StreamResampler`] to 16 kHz → [`f32_to_pcm16le`] bytes.
//!
//! Recognition path: bytes → [`pcm16le_to_f32`] → Whisper.
//!
//! Playback path: decoded i16 clip → [`i16_to_f32`] → [`resample_clip`] to
//! the output device rate.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Average interleaved frames down to one channel.  `channels == 0` yields an
/// empty buffer; a trailing partial frame is dropped.
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.to_vec(),
        n => {
            let n = n as usize;
            interleaved
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Input frames handed to rubato per block.
const RESAMPLE_CHUNK: usize = 1024;

/// Silent blocks [`StreamResampler::finish`] may feed to drain rubato.
const MAX_FLUSH_BLOCKS: usize = 8;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("cannot build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Mono sample-rate converter for audio that arrives in arbitrary pieces.
///
/// Input is buffered until a full rubato block is available, so the phase
/// carries across calls and the total output length tracks
/// `input * to_rate / from_rate` regardless of how the input was split.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    from_rate: u64,
    to_rate: u64,
    pending: Vec<f32>,
    consumed: u64,
    produced: u64,
}

impl StreamResampler {
    /// Equal rates give a pass-through converter.
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, ResampleError> {
        let inner = if from_rate == to_rate {
            None
        } else {
            Some(FftFixedIn::<f32>::new(
                from_rate as usize,
                to_rate as usize,
                RESAMPLE_CHUNK,
                1,
                1,
            )?)
        };
        Ok(Self {
            inner,
            from_rate: from_rate as u64,
            to_rate: to_rate as u64,
            pending: Vec::new(),
            consumed: 0,
            produced: 0,
        })
    }

    /// Leading output frames that precede the first real input frame.
    pub fn output_delay(&self) -> usize {
        self.inner.as_ref().map_or(0, |r| r.output_delay())
    }

    /// Convert `samples`, returning every output frame that is complete so
    /// far.  Up to one block of input stays buffered for the next call.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, ResampleError> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(samples.to_vec());
        };
        self.pending.extend_from_slice(samples);
        self.consumed += samples.len() as u64;

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let block = resampler.process(&[&self.pending[..needed]], None)?;
            if let Some(channel) = block.first() {
                out.extend_from_slice(channel);
            }
            self.pending.drain(..needed);
        }
        self.produced += out.len() as u64;
        Ok(out)
    }

    /// Flush the end of a finite clip: feed silence until every frame owed
    /// for the input so far (plus the output delay) has been produced.
    pub fn finish(&mut self) -> Result<Vec<f32>, ResampleError> {
        let delay = self.output_delay() as u64;
        let target = (self.consumed * self.to_rate).div_ceil(self.from_rate) + delay;
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        let mut rounds = 0;
        while self.produced < target && rounds < MAX_FLUSH_BLOCKS {
            let mut block = std::mem::take(&mut self.pending);
            block.resize(resampler.input_frames_next(), 0.0);
            if let Some(channel) = resampler.process(&[block], None)?.into_iter().next() {
                self.produced += channel.len() as u64;
                out.extend(channel);
            }
            rounds += 1;
        }

        let excess = self.produced.saturating_sub(target) as usize;
        out.truncate(out.len().saturating_sub(excess));
        self.produced -= excess as u64;
        Ok(out)
    }
}

/// Resample a complete clip in one go, delay removed.
pub fn resample_clip(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ResampleError> {
    let mut resampler = StreamResampler::new(from_rate, to_rate)?;
    let delay = resampler.output_delay();
    let mut out = resampler.process(samples)?;
    out.extend(resampler.finish()?);
    out.drain(..delay.min(out.len()));
    Ok(out)
}

/// Quantise to signed 16-bit little-endian PCM, clamping out-of-range input.
pub fn f32_to_pcm16le(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            v.to_le_bytes()
        })
        .collect()
}

/// Inverse of [`f32_to_pcm16le`].  A trailing odd byte is ignored.
pub fn pcm16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect()
}

pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let stereo = [0.5_f32, -0.5, 0.2, 0.4];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.0).abs() < 1e-6);
        assert!((mono[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn downmix_edge_cases() {
        assert!(downmix(&[0.1, 0.2], 0).is_empty());
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        // Three samples of stereo: the dangling one is dropped.
        assert_eq!(downmix(&[0.2, 0.2, 0.9], 2).len(), 1);
    }

    #[test]
    fn same_rate_is_pass_through() {
        let mut r = StreamResampler::new(16_000, 16_000).unwrap();
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(r.process(&input).unwrap(), input);
        assert!(r.finish().unwrap().is_empty());
    }

    #[test]
    fn small_callback_buffers_do_not_stretch_the_stream() {
        // 1 000 callbacks of 512 frames at 48 kHz is 10.67 s of audio.
        let mut r = StreamResampler::new(48_000, 16_000).unwrap();
        let callback: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let total: usize = (0..1_000).map(|_| r.process(&callback).unwrap().len()).sum();

        let expected = 512 * 1_000 / 3;
        assert!(total <= expected, "stream stretched: {total} > {expected}");
        // At most one buffered block on each side of rubato.
        assert!(expected - total < RESAMPLE_CHUNK, "lost too much: {total}");
    }

    #[test]
    fn output_does_not_depend_on_how_input_is_split() {
        let signal: Vec<f32> = (0..9_600).map(|i| (i as f32 * 0.01).sin()).collect();

        let mut whole = StreamResampler::new(48_000, 16_000).unwrap();
        let a = whole.process(&signal).unwrap();

        let mut pieces = StreamResampler::new(48_000, 16_000).unwrap();
        let b: Vec<f32> = signal
            .chunks(317)
            .flat_map(|c| pieces.process(c).unwrap())
            .collect();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn clip_is_flushed_completely() {
        assert_eq!(resample_clip(&vec![0.0; 4_410], 44_100, 48_000).unwrap().len(), 4_800);
        assert_eq!(resample_clip(&vec![0.0; 2_400], 24_000, 16_000).unwrap().len(), 1_600);
        assert!(resample_clip(&[], 44_100, 48_000).unwrap().is_empty());
    }

    #[test]
    fn pcm16_conversion_is_reversible_within_quantisation() {
        let input = [0.0_f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = f32_to_pcm16le(&input);
        assert_eq!(bytes.len(), input.len() * 2);
        let back = pcm16le_to_f32(&bytes);
        for (a, b) in input.iter().zip(&back) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn pcm16_clamps_and_ignores_odd_byte() {
        let bytes = f32_to_pcm16le(&[2.0, -3.0]);
        assert_eq!(&bytes[0..2], &i16::MAX.to_le_bytes());
        assert_eq!(&bytes[2..4], &(-i16::MAX).to_le_bytes());
        assert_eq!(pcm16le_to_f32(&[0x00, 0x40, 0x7f]).len(), 1);
    }
}
