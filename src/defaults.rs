//! Default configuration constants for voxlate.
//!
//! Shared by the config layer, the signer and the pipeline so every
//! component agrees on the same wire parameters.

/// Default audio sample rate in Hz.
///
/// The transcription service and the `pcm` synthesis output both run at 16kHz.
pub const SAMPLE_RATE: u32 = 16000;

/// Interval between outbound audio events, in milliseconds.
pub const SEND_INTERVAL_MS: u64 = 200;

/// Lifetime of a presigned transcription URL, in seconds.
pub const PRESIGN_EXPIRY_SECS: u64 = 300;

/// Default AWS region for all three services.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Port of the streaming transcription endpoint.
pub const TRANSCRIBE_PORT: u16 = 8443;

/// Path of the websocket transcription endpoint.
pub const TRANSCRIBE_PATH: &str = "/stream-transcription-websocket";

/// Media encoding sent in the `media-encoding` query parameter.
pub const MEDIA_ENCODING: &str = "pcm";

/// Output format requested from speech synthesis.
///
/// Raw 16-bit little-endian mono PCM; no decoder needed on playback.
pub const SYNTHESIS_OUTPUT_FORMAT: &str = "pcm";

/// Default source language key.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "english-us";

/// Default target language key.
pub const DEFAULT_TARGET_LANGUAGE: &str = "spanish";

/// Maximum number of utterances translated/synthesized concurrently.
pub const MAX_IN_FLIGHT: usize = 4;

/// Capacity of the pipeline event channel.
pub const EVENT_BUFFER: usize = 256;

/// Directory name for synthesized speech artifacts under the temp dir.
pub const ARTIFACT_DIR_NAME: &str = "voxlate-audio";

/// Timeout for translation and synthesis HTTP calls, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 15;

/// Default log filter when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "warn";
