//! Pipeline coordination: load progress and the request state machine.

mod machine;
mod progress;

pub use machine::{Pipeline, PipelineStatus, StallPolicy};
pub use progress::ProgressItem;
