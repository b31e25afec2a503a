//! Device selection and sample helpers shared by playback and decoding.

use anyhow::Result;
use cpal::traits::DeviceTrait;
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};

/// Human-readable device name, or "Unknown".
pub fn get_device_name(device: &Device) -> String {
    device.description().ok().map(|desc| desc.name().to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Pick an output configuration for playback.
///
/// Only mono or stereo F32 configurations are considered. The first one that
/// covers `target_sample_rate` wins; otherwise the first F32 configuration is
/// used at whichever of its bounds is nearest.
pub fn find_best_config(configs: impl Iterator<Item = SupportedStreamConfigRange>, target_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let candidates: Vec<SupportedStreamConfigRange> =
        configs.filter(|c| c.channels() <= 2 && c.sample_format() == SampleFormat::F32).collect();

    let Some(first) = candidates.first() else {
        anyhow::bail!("No F32 output configuration found");
    };

    if let Some(config) =
        candidates.iter().find(|c| (c.min_sample_rate()..=c.max_sample_rate()).contains(&target_sample_rate))
    {
        return Ok(config.clone().with_sample_rate(target_sample_rate));
    }

    let rate = if target_sample_rate < first.min_sample_rate() { first.min_sample_rate() } else { first.max_sample_rate() };
    Ok(first.clone().with_sample_rate(rate))
}

/// Average interleaved frames of `channels` samples down to mono.
pub fn mix_to_mono(data: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data;
    }
    data.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
}
