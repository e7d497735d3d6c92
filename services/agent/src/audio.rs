//! Transcodes raw call audio into the wire format the realtime service
//! expects: mono 16-bit little-endian PCM at 16 kHz.
//!
//! The whole transcode is a pure function so independent stream routers can
//! run it concurrently without shared state.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate the realtime service ingests.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of the PCM16 the service speaks back, used for playback pacing.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("frame of {samples} samples is not divisible by {channels} channels")]
    MalformedFrame { samples: usize, channels: u16 },
    #[error("unsupported frame parameters: {0}")]
    UnsupportedFrame(String),
    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Converts one interleaved PCM16 frame to mono 16 kHz PCM16 bytes.
///
/// Integer samples are normalized to [-1, 1], downmixed by channel
/// averaging, resampled with cubic interpolation, and rescaled with
/// clipping. A malformed frame is rejected so the caller can drop it and
/// keep the stream alive.
pub fn resample_frame(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, AudioError> {
    if channels == 0 {
        return Err(AudioError::UnsupportedFrame("zero channels".to_string()));
    }
    if sample_rate == 0 {
        return Err(AudioError::UnsupportedFrame("zero sample rate".to_string()));
    }
    if samples.len() % channels as usize != 0 {
        return Err(AudioError::MalformedFrame {
            samples: samples.len(),
            channels,
        });
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mono = downmix_to_mono(samples, channels);
    let resampled = if sample_rate == TARGET_SAMPLE_RATE {
        mono
    } else {
        let mut resampler = FastFixedIn::<f32>::new(
            TARGET_SAMPLE_RATE as f64 / sample_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            mono.len(),
            1,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;
        let mut output = resampler
            .process(&[mono], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.swap_remove(0)
    };

    Ok(rescale_to_pcm16(&resampled))
}

/// Normalizes interleaved i16 samples to f32 and averages channels.
fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
            sum / channels as f32
        })
        .collect()
}

/// Rescales normalized samples to 16-bit little-endian bytes, clipping on
/// overflow.
fn rescale_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
