//! voxlate - Live speech translation
//!
//! Streams microphone audio to a transcription service, translates each
//! finished utterance and speaks the translation back in arrival order.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod eventstream;
pub mod languages;
#[cfg(feature = "cli")]
pub mod logging;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod shutdown;
pub mod signing;

// Composition root - needs real devices and the CLI surface
#[cfg(all(feature = "cpal-audio", feature = "cli"))]
pub mod app;

// Core traits
pub use audio::{AudioPlayer, AudioSource};
pub use services::{Synthesizer, Translator};
pub use session::Connector;

// Live session
pub use pipeline::{LiveConfig, LiveHandle, LiveTranslation, PipelineEvent};

// Error handling
pub use error::{Result, VoxlateError};

// Config
pub use config::Config;

// Station framework
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
