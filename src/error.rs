//! Error types for voxlate.

use crate::eventstream::codec::FrameDecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Unknown language: {name}")]
    UnknownLanguage { name: String },

    #[error("Unknown voice: {name}")]
    UnknownVoice { name: String },

    // Wire protocol errors
    #[error("Frame decode error: {0}")]
    FrameDecode(#[from] FrameDecodeError),

    #[error("Frame encode error: {message}")]
    FrameEncode { message: String },

    // Signing errors
    #[error("Cannot sign request: missing credential field {field}")]
    SigningPrecondition { field: &'static str },

    #[error("Signed URL expired at {expired_at}")]
    SignedUrlExpired { expired_at: String },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    // Remote service errors
    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Audio errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxlateError {
    /// Whether this error ends the streaming session rather than a single utterance.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            VoxlateError::SigningPrecondition { .. }
                | VoxlateError::SignedUrlExpired { .. }
                | VoxlateError::Transport { .. }
                | VoxlateError::AudioCapture { .. }
                | VoxlateError::AudioDeviceNotFound { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxlateError::ConfigInvalidValue {
            key: "audio.sample_rate".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.sample_rate: must be positive"
        );
    }

    #[test]
    fn test_signing_precondition_display() {
        let error = VoxlateError::SigningPrecondition {
            field: "session_token",
        };
        assert_eq!(
            error.to_string(),
            "Cannot sign request: missing credential field session_token"
        );
    }

    #[test]
    fn test_frame_decode_from() {
        let decode = FrameDecodeError::TooShort { length: 3 };
        let error: VoxlateError = decode.into();
        assert!(error.to_string().starts_with("Frame decode error"));
        assert!(!error.is_session_fatal());
    }

    #[test]
    fn test_transport_display() {
        let error = VoxlateError::Transport {
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_translation_and_synthesis_display() {
        let t = VoxlateError::Translation {
            message: "status 400".to_string(),
        };
        assert_eq!(t.to_string(), "Translation failed: status 400");

        let s = VoxlateError::Synthesis {
            message: "status 500".to_string(),
        };
        assert_eq!(s.to_string(), "Speech synthesis failed: status 500");
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(VoxlateError::SigningPrecondition { field: "secret_key" }.is_session_fatal());
        assert!(
            VoxlateError::Transport {
                message: "closed".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            !VoxlateError::Translation {
                message: "x".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            !VoxlateError::Synthesis {
                message: "x".to_string()
            }
            .is_session_fatal()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxlateError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: VoxlateError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: VoxlateError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxlateError>();
        assert_sync::<VoxlateError>();
    }
}
