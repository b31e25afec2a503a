//! Duplex channel between the UI context and the worker thread.
//!
//! The channel is created once per session through `WorkerSlot` and lives until
//! shutdown. Inbound messages are validated and fanned out to subscribed
//! handlers; a handler stays registered for as long as its `Subscription` guard
//! is alive.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use anyhow::Result;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::{GenerationRequest, WorkerEvent, WorkerMessage};
use super::runtime::{SpeechEngine, WorkerParts, spawn_worker};

/// Errors raised when sending to the worker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no handler is subscribed to worker events")]
    NoSubscriber,
    #[error("worker channel is disconnected")]
    Disconnected,
}

/// Receiver of validated worker events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &WorkerEvent);

    /// Called once when the worker side of the channel has gone away.
    fn on_disconnect(&self) {}
}

/// Fire-and-forget outbound path to the worker.
pub trait Outbound {
    fn send(&self, request: GenerationRequest) -> Result<(), ChannelError>;
}

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn EventHandler>)>,
}

/// Keeps a handler registered. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    handlers: Weak<Mutex<Handlers>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.lock().entries.retain(|(id, _)| *id != self.id);
            debug!("Unsubscribed worker handler {}", self.id);
        }
    }
}

/// Channel to the background worker.
pub struct WorkerChannel {
    requests: mpsc::UnboundedSender<GenerationRequest>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<WorkerMessage>>,
    handlers: Arc<Mutex<Handlers>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerChannel {
    /// Spawn a worker thread running `engine` and connect to it.
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be started.
    pub fn spawn<E: SpeechEngine>(engine: E) -> Result<Self> {
        let WorkerParts { requests, events, thread } = spawn_worker(engine)?;
        info!("🧵 Worker thread started");
        Ok(Self::from_parts(requests, events, Some(thread)))
    }

    fn from_parts(
        requests: mpsc::UnboundedSender<GenerationRequest>,
        inbound: mpsc::UnboundedReceiver<WorkerMessage>,
        thread: Option<JoinHandle<()>>,
    ) -> Self {
        Self { requests, inbound: tokio::sync::Mutex::new(inbound), handlers: Arc::default(), thread }
    }

    /// Register `handler` for inbound events.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        let mut handlers = self.handlers.lock();
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.entries.push((id, handler));
        debug!("Subscribed worker handler {}", id);
        Subscription { id, handlers: Arc::downgrade(&self.handlers) }
    }

    /// Number of currently registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().entries.len()
    }

    /// Whether the worker thread is still running.
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the next raw message. `None` once the worker has hung up.
    pub async fn recv(&self) -> Option<WorkerMessage> {
        self.inbound.lock().await.recv().await
    }

    /// Validate `raw` and deliver it to every subscribed handler.
    ///
    /// Returns `false` if the message was ignored, either because it did not
    /// validate or because nobody is listening.
    pub fn dispatch(&self, raw: WorkerMessage) -> bool {
        let status = raw.status.clone();
        let Some(event) = WorkerEvent::parse(raw) else {
            debug!("Ignoring unrecognized worker message (status {:?})", status);
            return false;
        };

        let handlers = self.snapshot();
        if handlers.is_empty() {
            debug!("Dropping {} event, no handler subscribed", event.kind());
            return false;
        }

        for handler in &handlers {
            handler.on_event(&event);
        }
        true
    }

    /// Receive and dispatch one message. Returns `false` once the worker has
    /// hung up, after notifying handlers.
    pub async fn pump(&self) -> bool {
        match self.recv().await {
            Some(raw) => {
                self.dispatch(raw);
                true
            }
            None => {
                self.notify_disconnect();
                false
            }
        }
    }

    /// Tell every handler the worker is gone.
    pub fn notify_disconnect(&self) {
        for handler in self.snapshot() {
            handler.on_disconnect();
        }
    }

    // Handlers run outside the registry lock so they may drop subscriptions.
    fn snapshot(&self) -> Vec<Arc<dyn EventHandler>> {
        self.handlers.lock().entries.iter().map(|(_, h)| h.clone()).collect()
    }
}

impl Outbound for WorkerChannel {
    fn send(&self, request: GenerationRequest) -> Result<(), ChannelError> {
        if self.handler_count() == 0 {
            return Err(ChannelError::NoSubscriber);
        }
        self.requests.send(request).map_err(|_| ChannelError::Disconnected)
    }
}

/// Holds the session's single worker channel.
///
/// The first `get_or_spawn` constructs the channel; later calls reuse it and
/// never run their constructor.
#[derive(Default)]
pub struct WorkerSlot {
    channel: Option<Arc<WorkerChannel>>,
}

impl WorkerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing channel, or build one with `spawn`.
    ///
    /// # Errors
    /// Propagates the constructor's error; the slot stays empty in that case.
    pub fn get_or_spawn<F>(&mut self, spawn: F) -> Result<Arc<WorkerChannel>>
    where
        F: FnOnce() -> Result<WorkerChannel>,
    {
        if let Some(channel) = &self.channel {
            debug!("Reusing existing worker channel");
            return Ok(channel.clone());
        }
        let channel = Arc::new(spawn()?);
        self.channel = Some(channel.clone());
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::runtime::tests::ScriptedEngine;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<WorkerEvent>>,
        disconnected: Mutex<bool>,
    }

    impl EventHandler for Recorder {
        fn on_event(&self, event: &WorkerEvent) {
            self.events.lock().push(event.clone());
        }

        fn on_disconnect(&self) {
            *self.disconnected.lock() = true;
        }
    }

    fn loopback() -> (WorkerChannel, mpsc::UnboundedSender<WorkerMessage>, mpsc::UnboundedReceiver<GenerationRequest>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (WorkerChannel::from_parts(request_tx, event_rx, None), event_tx, request_rx)
    }

    #[test]
    fn test_send_requires_subscriber() {
        let (channel, _events, mut requests) = loopback();
        let request = GenerationRequest { text: "hi".into(), speaker_id: "af_bella".into() };

        assert_eq!(channel.send(request.clone()), Err(ChannelError::NoSubscriber));
        assert!(requests.try_recv().is_err());

        let _sub = channel.subscribe(Arc::new(Recorder::default()));
        assert_eq!(channel.send(request.clone()), Ok(()));
        assert_eq!(requests.try_recv().unwrap(), request);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let (channel, _events, _requests) = loopback();
        let recorder = Arc::new(Recorder::default());

        let sub = channel.subscribe(recorder.clone());
        assert!(channel.dispatch(WorkerMessage::ready()));
        drop(sub);

        assert_eq!(channel.handler_count(), 0);
        assert!(!channel.dispatch(WorkerMessage::initiate("a")));
        assert_eq!(*recorder.events.lock(), vec![WorkerEvent::Ready]);
    }

    #[test]
    fn test_unknown_messages_are_not_dispatched() {
        let (channel, _events, _requests) = loopback();
        let recorder = Arc::new(Recorder::default());
        let _sub = channel.subscribe(recorder.clone());

        let raw = WorkerMessage { status: "update".into(), ..Default::default() };
        assert!(!channel.dispatch(raw));
        assert!(recorder.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pump_reports_disconnect() {
        let (channel, events, _requests) = loopback();
        let recorder = Arc::new(Recorder::default());
        let _sub = channel.subscribe(recorder.clone());

        events.send(WorkerMessage::done("a")).unwrap();
        drop(events);

        assert!(channel.pump().await);
        assert!(!channel.pump().await);
        assert_eq!(*recorder.events.lock(), vec![WorkerEvent::Done { file: "a".into() }]);
        assert!(*recorder.disconnected.lock());
    }

    #[test]
    fn test_slot_constructs_once() {
        let mut slot = WorkerSlot::new();
        let mut constructions = 0;

        let first = slot
            .get_or_spawn(|| {
                constructions += 1;
                WorkerChannel::spawn(ScriptedEngine::new(vec![]))
            })
            .unwrap();
        let second = slot
            .get_or_spawn(|| {
                constructions += 1;
                WorkerChannel::spawn(ScriptedEngine::new(vec![]))
            })
            .unwrap();

        assert_eq!(constructions, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_slot_stays_empty_after_failed_spawn() {
        let mut slot = WorkerSlot::new();
        assert!(slot.get_or_spawn(|| anyhow::bail!("no threads left")).is_err());

        let mut retried = false;
        slot.get_or_spawn(|| {
            retried = true;
            WorkerChannel::spawn(ScriptedEngine::new(vec![]))
        })
        .unwrap();
        assert!(retried);
    }
}
