//! WAV container for synthesized artifacts.
//!
//! The worker encodes mono 32-bit float WAV in memory; playback decodes it back
//! to samples. 16-bit PCM input is also accepted on the decode side.

use std::io::Cursor;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::util::mix_to_mono;

/// File extension matching the artifact encoding.
pub const EXTENSION: &str = "wav";

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Encode mono samples as an in-memory 32-bit float WAV file.
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec { channels: 1, sample_rate, bits_per_sample: 32, sample_format: SampleFormat::Float };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 4));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).context("Failed to start WAV writer")?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }
    Ok(cursor.into_inner())
}

/// Decode a WAV payload to mono f32 samples, mixing down extra channels.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader = WavReader::new(Cursor::new(bytes)).context("Artifact is not a WAV file")?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader.into_samples::<i16>().map(|s| s.map(|v| v as f32 / i16::MAX as f32)).collect::<Result<_, _>>()?,
        (format, bits) => anyhow::bail!("Unsupported WAV encoding: {:?} {}-bit", format, bits),
    };

    Ok(DecodedAudio { samples: mix_to_mono(interleaved, channels), sample_rate: spec.sample_rate })
}
