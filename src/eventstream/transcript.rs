//! Transcript payloads carried inside inbound event-stream frames.

use crate::eventstream::codec::{EventStreamMessage, FrameDecodeError};
use serde::{Deserialize, Serialize};

/// A `TranscriptEvent` body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptEvent {
    pub transcript: Transcript,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transcript {
    #[serde(default)]
    pub results: Vec<TranscriptResult>,
}

/// One recognition result. Partial results may still be revised by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TranscriptResult {
    pub alternatives: Vec<Alternative>,
    pub channel_id: Option<String>,
    pub end_time: f64,
    pub is_partial: bool,
    pub result_id: Option<String>,
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Alternative {
    pub transcript: String,
    pub items: Vec<Item>,
}

/// A single recognized token (word or punctuation).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Item {
    pub content: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(rename = "Type")]
    pub kind: String,
    pub vocabulary_filter_match: bool,
    pub confidence: Option<f64>,
    pub stable: Option<bool>,
}

impl TranscriptEvent {
    /// Parses a UTF-8 JSON payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameDecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| FrameDecodeError::InvalidUtf8 { field: "payload" })?;
        serde_json::from_str(text).map_err(|e| FrameDecodeError::Payload {
            message: e.to_string(),
        })
    }

    /// Returns `true` if the event carries at least one final result.
    pub fn has_final(&self) -> bool {
        self.transcript.results.iter().any(|r| !r.is_partial)
    }
}

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Transcript(TranscriptEvent),
    /// The service rejected the stream; the session cannot continue.
    Exception { kind: String, message: String },
    /// Any other event type; ignored by the pipeline.
    Other { event_type: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExceptionBody {
    #[serde(default)]
    message: Option<String>,
}

impl InboundEvent {
    /// Classifies a decoded frame by its `:message-type` and `:event-type` headers.
    pub fn classify(message: &EventStreamMessage) -> Result<Self, FrameDecodeError> {
        match message.header(":message-type") {
            Some("exception") => {
                let kind = message
                    .header(":exception-type")
                    .unwrap_or("UnknownException")
                    .to_string();
                let text = String::from_utf8_lossy(&message.payload).into_owned();
                let message = serde_json::from_str::<ExceptionBody>(&text)
                    .ok()
                    .and_then(|b| b.message)
                    .unwrap_or(text);
                Ok(InboundEvent::Exception { kind, message })
            }
            Some("error") => Ok(InboundEvent::Exception {
                kind: message.header(":error-code").unwrap_or("Error").to_string(),
                message: message.header(":error-message").unwrap_or("").to_string(),
            }),
            _ => match message.header(":event-type") {
                Some("TranscriptEvent") => Ok(InboundEvent::Transcript(
                    TranscriptEvent::from_payload(&message.payload)?,
                )),
                other => Ok(InboundEvent::Other {
                    event_type: other.unwrap_or("").to_string(),
                }),
            },
        }
    }
}
