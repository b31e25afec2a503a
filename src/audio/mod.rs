//! Audio output and the artifact container format.
//!
//! Playback goes through cpal with resampling via rubato; artifacts are WAV
//! files encoded and decoded with hound.

mod playback;
mod resampler;
mod util;
pub mod wav;

pub use playback::Player;
