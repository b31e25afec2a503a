//! Background inference worker and the channel that talks to it.
//!
//! The worker runs on its own OS thread and never shares memory with the UI
//! context; everything crosses the channel as typed one-way messages.

mod channel;
mod kokoro;
mod messages;
mod runtime;

pub use channel::{ChannelError, EventHandler, Outbound, Subscription, WorkerChannel, WorkerSlot};
pub use kokoro::KokoroEngine;
pub use messages::{GenerationRequest, WorkerEvent};

#[cfg(test)]
pub(crate) use runtime::tests::ScriptedEngine;
