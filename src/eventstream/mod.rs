//! Event-stream wire format: framing and transcript payloads.

pub mod codec;
pub mod transcript;

pub use codec::{
    EventStreamMessage, FrameDecodeError, Header, audio_event, decode, encode, end_of_stream,
};
pub use transcript::{Alternative, InboundEvent, Item, Transcript, TranscriptEvent, TranscriptResult};
