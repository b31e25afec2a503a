//! The pipeline controller.
//!
//! Interprets worker events, owns the readiness state and gates generation
//! requests so that at most one is in flight.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::progress::ProgressTracker;
use crate::config::Speaker;
use crate::output::{Download, OutputSink};
use crate::worker::{ChannelError, EventHandler, GenerationRequest, Outbound, WorkerEvent};

/// Lifecycle of the worker as seen from the UI context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// No worker event seen yet
    Uninitialized,
    /// Model files are being staged
    Loading,
    Ready,
    /// A request is in flight
    Busy,
    /// Load timed out, the worker failed or it hung up
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Reasons a submission is rejected. Nothing is sent in any of these cases.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("the model is not ready (status: {0})")]
    NotReady(PipelineStatus),
    #[error("a generation is already in progress")]
    Busy,
    #[error("nothing to say")]
    EmptyText,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Watchdog thresholds.
#[derive(Debug, Clone, Copy)]
pub struct StallPolicy {
    /// Longest time allowed in `Uninitialized` or `Loading`
    pub load_timeout: Duration,
    /// Time in `Busy` after which a warning is logged
    pub generation_timeout: Duration,
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self { load_timeout: Duration::from_secs(300), generation_timeout: Duration::from_secs(120) }
    }
}

/// The pipeline state machine.
pub struct Pipeline {
    status: PipelineStatus,
    progress: ProgressTracker,
    sink: OutputSink,
    speaker: Speaker,
    policy: StallPolicy,
    /// When the current status was entered
    since: Instant,
    stall_warned: bool,
    last_error: Option<String>,
}

impl Pipeline {
    pub fn new(sink: OutputSink, speaker: Speaker, policy: StallPolicy) -> Self {
        Self {
            status: PipelineStatus::Uninitialized,
            progress: ProgressTracker::new(),
            sink,
            speaker,
            policy,
            since: Instant::now(),
            stall_warned: false,
            last_error: None,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    /// Most recent worker error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn select_speaker(&mut self, speaker: Speaker) {
        if speaker != self.speaker {
            info!("🗣️  Speaker set to {}", speaker);
            if speaker.frontend() != self.speaker.frontend() {
                info!("The next request reloads the model for {}", speaker.frontend());
            }
        }
        self.speaker = speaker;
    }

    /// Send `text` to the worker with the selected speaker.
    ///
    /// Accepted only in `Ready`; on success the status becomes `Busy` until the
    /// worker answers with `complete` or `error`.
    ///
    /// # Errors
    /// Returns `SubmitError` without sending anything when the pipeline is not
    /// ready, the text is blank, or the channel refuses the request.
    pub fn submit(&mut self, text: &str, outbound: &dyn Outbound) -> Result<(), SubmitError> {
        match self.status {
            PipelineStatus::Ready => {}
            PipelineStatus::Busy => return Err(SubmitError::Busy),
            other => return Err(SubmitError::NotReady(other)),
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyText);
        }

        let request = GenerationRequest { text: text.to_string(), speaker_id: self.speaker.id().to_string() };
        outbound.send(request)?;

        info!("✍️  Generating with {}: \"{}\"", self.speaker, text);
        self.enter(PipelineStatus::Busy);
        Ok(())
    }

    /// Apply one validated worker event.
    pub fn handle_event(&mut self, event: &WorkerEvent) {
        match event {
            WorkerEvent::Initiate { file } => {
                self.progress.on_initiate(file);
                if self.status == PipelineStatus::Uninitialized {
                    info!("📦 Loading model files...");
                    self.enter(PipelineStatus::Loading);
                }
                debug!("Loading {}", file);
            }
            WorkerEvent::Progress { file, progress } => {
                if !self.progress.on_progress(file, *progress) {
                    debug!("Progress for untracked file {}", file);
                }
            }
            WorkerEvent::Done { file } => {
                self.progress.on_done(file);
                debug!("Loaded {}", file);
            }
            WorkerEvent::Ready => match self.status {
                PipelineStatus::Uninitialized | PipelineStatus::Loading | PipelineStatus::Failed => {
                    info!("✅ Model ready");
                    self.last_error = None;
                    self.enter(PipelineStatus::Ready);
                }
                PipelineStatus::Ready | PipelineStatus::Busy => debug!("Duplicate ready while {}", self.status),
            },
            WorkerEvent::Complete { output } => {
                if self.status != PipelineStatus::Busy {
                    warn!("Received audio while {}", self.status);
                }
                self.sink.on_artifact(output.clone());
                if self.status == PipelineStatus::Busy {
                    self.enter(PipelineStatus::Ready);
                }
            }
            WorkerEvent::Error { message } => {
                self.last_error = Some(message.clone());
                if self.status == PipelineStatus::Busy {
                    error!("❌ Generation failed: {}", message);
                    self.enter(PipelineStatus::Ready);
                } else {
                    error!("❌ Worker failed: {}", message);
                    self.enter(PipelineStatus::Failed);
                }
            }
        }
    }

    /// The worker side of the channel is gone.
    pub fn on_disconnect(&mut self) {
        if self.status != PipelineStatus::Failed {
            error!("❌ Worker disconnected while {}", self.status);
            self.last_error.get_or_insert_with(|| "worker disconnected".to_string());
            self.enter(PipelineStatus::Failed);
        }
    }

    /// Apply the watchdog thresholds at `now`.
    ///
    /// Returns `true` if the status changed.
    pub fn check_stalled(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.since);
        match self.status {
            PipelineStatus::Uninitialized | PipelineStatus::Loading if elapsed > self.policy.load_timeout => {
                error!("❌ Model did not become ready within {:?}", self.policy.load_timeout);
                self.last_error = Some("model load timed out".to_string());
                self.enter(PipelineStatus::Failed);
                true
            }
            PipelineStatus::Busy if elapsed > self.policy.generation_timeout && !self.stall_warned => {
                warn!("⏳ Generation has been running for {}s", elapsed.as_secs());
                self.stall_warned = true;
                false
            }
            _ => false,
        }
    }

    /// Prepare a download of the current artifact. `None` if there is none.
    pub fn request_download(&self) -> Option<Download> {
        let download = self.sink.on_download_requested();
        if download.is_none() {
            debug!("Download requested with no artifact");
        }
        download
    }

    fn enter(&mut self, status: PipelineStatus) {
        debug!("Pipeline {} -> {}", self.status, status);
        self.status = status;
        self.since = Instant::now();
        self.stall_warned = false;
    }
}

impl EventHandler for parking_lot::Mutex<Pipeline> {
    fn on_event(&self, event: &WorkerEvent) {
        self.lock().handle_event(event);
    }

    fn on_disconnect(&self) {
        self.lock().on_disconnect();
    }
}
