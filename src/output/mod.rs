//! Output sink for synthesized audio: playback and downloads.

mod object_url;
mod playback;
mod sink;

pub use playback::{DevicePlayback, MutedPlayback, Playback};
pub use sink::{Download, OutputSink};

#[cfg(test)]
pub(crate) use playback::tests::RecordingPlayback;
