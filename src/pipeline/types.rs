//! Data types passed between pipeline stages.

use std::path::PathBuf;

/// A finalized utterance from the transcription stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StableTranscript {
    pub text: String,
    pub result_id: Option<String>,
    /// Seconds from the start of the stream.
    pub start_time: f64,
    pub end_time: f64,
}

impl StableTranscript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            result_id: None,
            start_time: 0.0,
            end_time: 0.0,
        }
    }
}

/// One utterance after translation, tagged with its submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub sequence: u64,
    pub source_text: String,
    pub translated_text: String,
}

/// Synthesized speech ready for the playback queue.
///
/// The queue owns the artifact file from the moment the item is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    pub sequence: u64,
    pub translated_text: String,
    pub artifact: PathBuf,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Where in the translate → synthesize chain an utterance failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Translation,
    Synthesis,
    Artifact,
    Playback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Translation => "translation",
            Stage::Synthesis => "synthesis",
            Stage::Artifact => "artifact",
            Stage::Playback => "playback",
        };
        f.write_str(name)
    }
}
