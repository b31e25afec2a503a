//! Configuration module for Utterify.
//!
//! Provides CLI argument parsing and the speaker table.

#[allow(clippy::module_inception)]
mod config;
mod voices;

pub use config::AppConfig;
pub use voices::{Frontend, Speaker, print_speakers};
