//! Terminal front-end: turns input lines into intents and drives the event loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::{Speaker, print_speakers};
use crate::pipeline::{Pipeline, PipelineStatus, ProgressItem};
use crate::worker::{Subscription, WorkerChannel};

/// How often the watchdog runs and load progress is rendered.
const TICK: Duration = Duration::from_secs(1);

/// A user action parsed from one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Submit(String),
    SelectSpeaker(String),
    ListSpeakers,
    Download,
    Status,
    Quit,
    Unknown(String),
}

impl Intent {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Submit(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        let intent = match name {
            "speaker" if !arg.is_empty() => Self::SelectSpeaker(arg.to_string()),
            "speaker" | "speakers" => Self::ListSpeakers,
            "download" | "save" => Self::Download,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name.to_string()),
        };
        Some(intent)
    }
}

/// Whether the loop should keep going after an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The front-end session. Holds the pipeline's subscription for its lifetime.
pub struct App {
    pipeline: Arc<Mutex<Pipeline>>,
    channel: Arc<WorkerChannel>,
    _subscription: Subscription,
}

impl App {
    /// Subscribe `pipeline` to `channel`. Must happen before the first submit.
    pub fn new(pipeline: Arc<Mutex<Pipeline>>, channel: Arc<WorkerChannel>) -> Self {
        let subscription = channel.subscribe(pipeline.clone());
        Self { pipeline, channel, _subscription: subscription }
    }

    /// Carry out one intent.
    pub fn apply(&self, intent: Intent) -> Flow {
        match intent {
            Intent::Submit(text) => {
                let result = self.pipeline.lock().submit(&text, self.channel.as_ref());
                if let Err(e) = result {
                    warn!("⚠️  Not sent: {}", e);
                }
            }
            Intent::SelectSpeaker(key) => match Speaker::lookup(&key) {
                Some(speaker) => self.pipeline.lock().select_speaker(speaker),
                None => warn!("⚠️  Unknown speaker '{}', try /speakers", key),
            },
            Intent::ListSpeakers => print_speakers(),
            Intent::Download => self.download(),
            Intent::Status => self.log_status(),
            Intent::Quit => return Flow::Quit,
            Intent::Unknown(name) => {
                warn!("⚠️  Unknown command /{}", name);
                info!("Commands: /speaker <id|name>, /speakers, /download, /status, /quit");
            }
        }
        Flow::Continue
    }

    /// Run until quit, end of input while idle, or a shutdown signal.
    pub async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut tick = tokio::time::interval(TICK);
        let shutdown = wait_for_shutdown();
        tokio::pin!(shutdown);

        let mut stdin_open = true;
        let mut worker_open = true;

        info!("Type text to speak it, or /speakers, /speaker <id>, /download, /status, /quit");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if let Some(intent) = Intent::parse(&line)
                            && self.apply(intent) == Flow::Quit
                        {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        stdin_open = false;
                    }
                    Err(e) => {
                        error!("❌ Failed to read input: {}", e);
                        stdin_open = false;
                    }
                },
                open = self.channel.pump(), if worker_open => {
                    worker_open = open;
                },
                _ = tick.tick() => self.on_tick(),
            }

            if !stdin_open && self.pipeline.lock().status() != PipelineStatus::Busy {
                break;
            }
        }

        info!("✅ Utterify stopped");
        Ok(())
    }

    fn on_tick(&self) {
        let mut pipeline = self.pipeline.lock();
        pipeline.check_stalled(Instant::now());
        if pipeline.status() == PipelineStatus::Loading && !pipeline.progress().is_empty() {
            info!("⏬ {}", render_progress(pipeline.progress().items()));
        }
    }

    fn download(&self) {
        let Some(download) = self.pipeline.lock().request_download() else {
            info!("Nothing to download yet");
            return;
        };

        debug!("Saving {}", download.file_name());
        tokio::task::spawn_blocking(move || {
            if let Err(e) = download.save() {
                error!("❌ Download failed: {:#}", e);
            }
        });
    }

    fn log_status(&self) {
        let pipeline = self.pipeline.lock();
        info!("Status: {}", pipeline.status());
        info!("Speaker: {}", pipeline.speaker());
        if !pipeline.progress().is_empty() {
            info!("Loading {} file(s): {}", pipeline.progress().len(), render_progress(pipeline.progress().items()));
        }
        match pipeline.sink().current() {
            Some(handle) => info!("Current audio: {} ({} bytes)", handle, handle.len()),
            None => info!("Current audio: none"),
        }
        debug!("Live audio handles: {}", pipeline.sink().live_handles());
        if let Some(e) = pipeline.last_error() {
            info!("Last error: {}", e);
        }
        if !self.channel.is_alive() {
            warn!("Worker thread has stopped");
        }
    }
}

/// One-line summary of in-flight loads, in insertion order.
pub fn render_progress(items: &[ProgressItem]) -> String {
    items.iter().map(|item| format!("{} {:.0}%", item.file, item.progress)).collect::<Vec<_>>().join(" | ")
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputSink, RecordingPlayback};
    use crate::pipeline::StallPolicy;
    use crate::worker::ScriptedEngine;

    #[test]
    fn test_parse_intents() {
        assert_eq!(Intent::parse("  hello world "), Some(Intent::Submit("hello world".into())));
        assert_eq!(Intent::parse("/speaker George"), Some(Intent::SelectSpeaker("George".into())));
        assert_eq!(Intent::parse("/speaker"), Some(Intent::ListSpeakers));
        assert_eq!(Intent::parse("/speakers"), Some(Intent::ListSpeakers));
        assert_eq!(Intent::parse("/download"), Some(Intent::Download));
        assert_eq!(Intent::parse("/status"), Some(Intent::Status));
        assert_eq!(Intent::parse("/quit"), Some(Intent::Quit));
        assert_eq!(Intent::parse("/dance now"), Some(Intent::Unknown("dance".into())));
        assert_eq!(Intent::parse("   "), None);
    }

    #[test]
    fn test_render_progress() {
        let items = vec![
            ProgressItem { file: "model.onnx".into(), progress: 33.4 },
            ProgressItem { file: "voices.bin".into(), progress: 100.0 },
        ];
        assert_eq!(render_progress(&items), "model.onnx 33% | voices.bin 100%");
        assert_eq!(render_progress(&[]), "");
    }

    async fn pump_until(channel: &WorkerChannel, pipeline: &Mutex<Pipeline>, status: PipelineStatus) {
        while pipeline.lock().status() != status {
            assert!(channel.pump().await, "worker hung up");
        }
    }

    #[tokio::test]
    async fn test_session_from_load_to_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let playback = Arc::new(RecordingPlayback::default());
        let sink = OutputSink::new(playback.clone(), dir.path());
        let pipeline = Arc::new(Mutex::new(Pipeline::new(sink, Speaker::default(), StallPolicy::default())));
        let channel = Arc::new(WorkerChannel::spawn(ScriptedEngine::new(vec!["tokens.txt", "model.onnx"])).unwrap());
        let app = App::new(pipeline.clone(), channel.clone());

        pump_until(&channel, &pipeline, PipelineStatus::Ready).await;
        assert!(pipeline.lock().progress().is_empty());

        assert_eq!(app.apply(Intent::SelectSpeaker("emma".into())), Flow::Continue);
        app.apply(Intent::Submit("hello".into()));
        assert_eq!(pipeline.lock().status(), PipelineStatus::Busy);

        pump_until(&channel, &pipeline, PipelineStatus::Ready).await;
        let played = playback.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].1, b"bf_emma:hello".to_vec());
        assert_eq!(app.apply(Intent::Quit), Flow::Quit);
    }
}
