//! Playback targets for finished artifacts.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::object_url::ArtifactHandle;
use crate::audio::{Player, wav};

/// Starts playback of an artifact. Implementations must not block the caller.
pub trait Playback: Send + Sync {
    fn play(&self, handle: &ArtifactHandle, payload: Arc<[u8]>);

    /// Stop whatever is currently playing.
    fn stop(&self);
}

/// Plays artifacts through the default output device.
///
/// Each artifact is decoded and played on tokio's blocking pool. The playback
/// ticket is taken before the task is spawned, so a newer artifact or a stop
/// supersedes this one even while it is still decoding.
pub struct DevicePlayback {
    player: Arc<Player>,
    turn: Arc<Mutex<()>>,
}

impl DevicePlayback {
    pub fn new(player: Player) -> Self {
        Self { player: Arc::new(player), turn: Arc::default() }
    }
}

impl Playback for DevicePlayback {
    fn play(&self, handle: &ArtifactHandle, payload: Arc<[u8]>) {
        let player = self.player.clone();
        let turn = self.turn.clone();
        let url = handle.url().to_string();
        let ticket = player.begin();

        tokio::task::spawn_blocking(move || {
            let audio = match wav::decode(&payload) {
                Ok(audio) => audio,
                Err(e) => {
                    error!("❌ Cannot play {}: {:#}", url, e);
                    return;
                }
            };

            let _turn = turn.lock();
            info!("▶️  Playing {} ({:.1}s)", url, audio.duration_secs());
            if !player.play(&audio.samples, audio.sample_rate, ticket) {
                debug!("Playback of {} stopped early", url);
            }
        });
    }

    fn stop(&self) {
        self.player.interrupt();
    }
}

/// Used with `--mute`: artifacts are only logged.
pub struct MutedPlayback;

impl Playback for MutedPlayback {
    fn play(&self, handle: &ArtifactHandle, payload: Arc<[u8]>) {
        match wav::decode(&payload) {
            Ok(audio) => info!("🔇 Muted: {} ({:.1}s)", handle, audio.duration_secs()),
            Err(_) => info!("🔇 Muted: {} ({} bytes)", handle, payload.len()),
        }
    }

    fn stop(&self) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every play and stop call.
    #[derive(Default)]
    pub(crate) struct RecordingPlayback {
        played: Mutex<Vec<(String, Vec<u8>)>>,
        stops: Mutex<usize>,
    }

    impl RecordingPlayback {
        pub fn played(&self) -> Vec<(String, Vec<u8>)> {
            self.played.lock().clone()
        }

        pub fn stops(&self) -> usize {
            *self.stops.lock()
        }
    }

    impl Playback for RecordingPlayback {
        fn play(&self, handle: &ArtifactHandle, payload: Arc<[u8]>) {
            self.played.lock().push((handle.url().to_string(), payload.to_vec()));
        }

        fn stop(&self) {
            *self.stops.lock() += 1;
        }
    }
}
