//! The worker side of the channel: a dedicated thread that owns the speech engine.
//!
//! The thread loads the engine first (reporting per-file progress), announces
//! `ready`, and then serves generation requests one at a time until the request
//! channel closes.

use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::messages::{GenerationRequest, WorkerMessage};

/// Capability contract for the inference backend running inside the worker.
pub trait SpeechEngine: Send + 'static {
    /// Load model files, reporting each one through `reporter`.
    fn load(&mut self, reporter: &LoadReporter) -> Result<()>;

    /// Synthesize `text` with the given backend speaker and return an encoded
    /// audio artifact.
    fn synthesize(&mut self, text: &str, speaker_id: &str) -> Result<Vec<u8>>;
}

/// Posts load progress back to the UI context.
pub struct LoadReporter {
    events: mpsc::UnboundedSender<WorkerMessage>,
}

impl LoadReporter {
    pub(crate) fn new(events: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self { events }
    }

    pub fn initiate(&self, file: &str) {
        self.post(WorkerMessage::initiate(file));
    }

    pub fn progress(&self, file: &str, progress: f32) {
        self.post(WorkerMessage::progress(file, progress));
    }

    pub fn done(&self, file: &str) {
        self.post(WorkerMessage::done(file));
    }

    fn post(&self, message: WorkerMessage) {
        // The UI side going away is handled by the request loop ending.
        let _ = self.events.send(message);
    }
}

/// Handles returned by `spawn_worker`.
pub struct WorkerParts {
    pub requests: mpsc::UnboundedSender<GenerationRequest>,
    pub events: mpsc::UnboundedReceiver<WorkerMessage>,
    pub thread: JoinHandle<()>,
}

/// Start the worker thread for `engine`.
///
/// # Errors
/// Returns an error if the OS refuses to spawn the thread.
pub fn spawn_worker<E: SpeechEngine>(engine: E) -> Result<WorkerParts> {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let thread = std::thread::Builder::new()
        .name("utterify-worker".into())
        .spawn(move || run_worker(engine, request_rx, event_tx))
        .context("Failed to spawn worker thread")?;

    Ok(WorkerParts { requests: request_tx, events: event_rx, thread })
}

fn run_worker<E: SpeechEngine>(
    mut engine: E,
    mut requests: mpsc::UnboundedReceiver<GenerationRequest>,
    events: mpsc::UnboundedSender<WorkerMessage>,
) {
    let reporter = LoadReporter::new(events.clone());

    if let Err(e) = engine.load(&reporter) {
        error!("❌ Worker failed to load the model: {:#}", e);
        let _ = events.send(WorkerMessage::error(format!("{:#}", e)));
        return;
    }

    info!("Worker ready");
    if events.send(WorkerMessage::ready()).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        debug!("Worker received request ({} chars, speaker {})", request.text.len(), request.speaker_id);

        let message = match engine.synthesize(&request.text, &request.speaker_id) {
            Ok(output) => WorkerMessage::complete(output),
            Err(e) => {
                error!("❌ Synthesis failed: {:#}", e);
                WorkerMessage::error(format!("{:#}", e))
            }
        };

        if events.send(message).is_err() {
            debug!("Event channel closed, worker exiting");
            break;
        }
    }

    debug!("Worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Engine double that reports a fixed set of files and echoes text as bytes.
    pub(crate) struct ScriptedEngine {
        pub files: Vec<&'static str>,
        pub fail_load: bool,
    }

    impl ScriptedEngine {
        pub fn new(files: Vec<&'static str>) -> Self {
            Self { files, fail_load: false }
        }
    }

    impl SpeechEngine for ScriptedEngine {
        fn load(&mut self, reporter: &LoadReporter) -> Result<()> {
            if self.fail_load {
                anyhow::bail!("model.onnx not found");
            }
            for file in &self.files {
                reporter.initiate(file);
                reporter.progress(file, 50.0);
                reporter.progress(file, 100.0);
                reporter.done(file);
            }
            Ok(())
        }

        fn synthesize(&mut self, text: &str, speaker_id: &str) -> Result<Vec<u8>> {
            if text == "fail" {
                anyhow::bail!("synthesis exploded");
            }
            Ok(format!("{}:{}", speaker_id, text).into_bytes())
        }
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> WorkerMessage {
        events.recv().await.expect("worker hung up")
    }

    #[tokio::test]
    async fn test_load_then_ready_then_complete() {
        let WorkerParts { requests, mut events, thread } = spawn_worker(ScriptedEngine::new(vec!["tokens.txt"])).unwrap();

        assert_eq!(next(&mut events).await, WorkerMessage::initiate("tokens.txt"));
        assert_eq!(next(&mut events).await, WorkerMessage::progress("tokens.txt", 50.0));
        assert_eq!(next(&mut events).await, WorkerMessage::progress("tokens.txt", 100.0));
        assert_eq!(next(&mut events).await, WorkerMessage::done("tokens.txt"));
        assert_eq!(next(&mut events).await, WorkerMessage::ready());

        requests.send(GenerationRequest { text: "hi".into(), speaker_id: "af_bella".into() }).unwrap();
        assert_eq!(next(&mut events).await, WorkerMessage::complete(b"af_bella:hi".to_vec()));

        requests.send(GenerationRequest { text: "fail".into(), speaker_id: "af_bella".into() }).unwrap();
        assert_eq!(next(&mut events).await.status, "error");

        drop(requests);
        assert!(events.recv().await.is_none());
        thread.join().unwrap();
    }

    #[tokio::test]
    async fn test_failed_load_reports_error_and_exits() {
        let mut engine = ScriptedEngine::new(vec![]);
        engine.fail_load = true;
        let WorkerParts { requests: _requests, mut events, thread } = spawn_worker(engine).unwrap();

        let message = next(&mut events).await;
        assert_eq!(message.status, "error");
        assert!(message.message.unwrap().contains("model.onnx"));
        assert!(events.recv().await.is_none());
        thread.join().unwrap();
    }
}
