//! Utterify - a text-to-speech client for the Kokoro model.
//!
//! Text typed at the prompt is sent to a background worker running Kokoro
//! through Sherpa ONNX. The resulting audio is played back immediately and can
//! be saved with `/download`.

mod app;
mod audio;
mod config;
mod output;
mod pipeline;
mod worker;

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use app::App;
use audio::Player;
use config::AppConfig;
use output::{DevicePlayback, MutedPlayback, OutputSink, Playback};
use pipeline::{Pipeline, StallPolicy};
use worker::{KokoroEngine, WorkerChannel, WorkerSlot};

/// Pick the playback target, falling back to muted output without a device.
fn build_playback(mute: bool) -> Arc<dyn Playback> {
    if mute {
        info!("🔇 Audio output disabled");
        return Arc::new(MutedPlayback);
    }
    match Player::new() {
        Ok(player) => Arc::new(DevicePlayback::new(player)),
        Err(e) => {
            warn!("⚠️  No audio output ({:#}), continuing muted", e);
            Arc::new(MutedPlayback)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_args();

    // RUST_LOG wins over --verbose; info by default
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🗣️  Utterify v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        error!("Place the kokoro-multi-lang-v1_0 model under {}", config.model_dir.display());
        std::process::exit(1);
    }
    config.log_config();

    let sink = OutputSink::new(build_playback(config.mute), &config.download_dir);
    let policy = StallPolicy { load_timeout: config.load_timeout(), generation_timeout: config.generation_timeout() };
    let pipeline = Arc::new(Mutex::new(Pipeline::new(sink, config.initial_speaker().unwrap_or_default(), policy)));

    let mut slot = WorkerSlot::new();
    let channel = match slot.get_or_spawn(|| WorkerChannel::spawn(KokoroEngine::new(&config))) {
        Ok(channel) => channel,
        Err(e) => {
            error!("❌ Failed to start the speech worker: {:#}", e);
            std::process::exit(1);
        }
    };

    App::new(pipeline, channel).run().await
}
