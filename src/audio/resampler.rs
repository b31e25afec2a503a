//! Batch resampling of decoded artifacts to the output device rate.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Requested frames per FFT block.
const CHUNK_SIZE: usize = 1024;

/// Sub-chunks per FFT pass (higher = better quality, more CPU).
const SUB_CHUNKS: usize = 2;

/// Resample a whole mono buffer from `from_rate` to `to_rate`.
///
/// Kokoro renders at 24 kHz while most devices run at 44.1 or 48 kHz, so every
/// artifact goes through here once before playback.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1, FixedSync::Input)
        .context("Failed to create resampler")?;

    // Rubato may round the block size to suit the ratio (e.g. 24k -> 44.1k).
    let chunk_size = resampler.input_frames_next();
    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64) as usize;
    let mut output = Vec::with_capacity(expected_len + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        // The final chunk is zero-padded to a full block
        let mut input_chunk = chunk.to_vec();
        input_chunk.resize(chunk_size, 0.0);

        let input_adapter = InterleavedSlice::new(&input_chunk, 1, chunk_size).context("Failed to create input adapter")?;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    // Drop most of the padding tail
    output.truncate(expected_len + 100);

    Ok(output)
}
