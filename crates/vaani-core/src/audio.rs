//! WAV encoding and the playback seam.
//!
//! Synthesized audio is raw mono f32 PCM. [`encode_wav`] wraps it in a
//! standard RIFF/WAVE container (16-bit PCM); actual sound-device output is
//! delegated to an [`AudioSink`] supplied by the host application.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{VaaniError, VaaniResult};

/// Size of the RIFF/WAVE header in bytes.
const WAV_HEADER_LEN: usize = 44;

/// Destination for synthesized audio playback.
///
/// The dispatcher never talks to a sound device itself; hosts implement this
/// trait over whatever output path they have and attach it to the engine.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play mono f32 samples at the given rate, resolving when playback ends.
    async fn play(&self, samples: &[f32], sample_rate: u32) -> anyhow::Result<()>;
}

/// Encode mono f32 samples as a 16-bit PCM RIFF/WAVE buffer.
///
/// The output is `44 + 2 * samples.len()` bytes: a standard 44-byte header
/// (PCM format tag 1, one channel, 16-bit depth, little-endian fields)
/// followed by the samples clamped to `[-1, 1]` and scaled to the signed
/// 16-bit range.
#[must_use]
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;
    let mut buffer = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);

    // RIFF chunk
    buffer.extend_from_slice(b"RIFF");
    buffer.extend_from_slice(&(36 + data_len).to_le_bytes());
    buffer.extend_from_slice(b"WAVE");

    // fmt chunk
    buffer.extend_from_slice(b"fmt ");
    buffer.extend_from_slice(&16u32.to_le_bytes());
    buffer.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    buffer.extend_from_slice(&1u16.to_le_bytes()); // mono
    buffer.extend_from_slice(&sample_rate.to_le_bytes());
    buffer.extend_from_slice(&byte_rate.to_le_bytes());
    buffer.extend_from_slice(&2u16.to_le_bytes()); // block align
    buffer.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    buffer.extend_from_slice(b"data");
    buffer.extend_from_slice(&data_len.to_le_bytes());

    for &sample in samples {
        buffer.extend_from_slice(&quantize(sample).to_le_bytes());
    }

    buffer
}

/// Clamp to [-1, 1] and scale to signed 16-bit.
fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 0x8000 as f32) as i16
    } else {
        (clamped * 0x7FFF as f32) as i16
    }
}

/// Write mono f32 samples to a 16-bit PCM WAV file.
///
/// # Errors
///
/// Returns a file error when the file cannot be created or written.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> VaaniResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| VaaniError::file(format!("failed to create {}: {e}", path.display())))?;
    for &sample in samples {
        writer
            .write_sample(quantize(sample))
            .map_err(|e| VaaniError::file(format!("failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| VaaniError::file(format!("failed to finalize {}: {e}", path.display())))?;
    Ok(())
}
