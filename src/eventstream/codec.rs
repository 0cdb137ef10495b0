//! Binary event-stream framing.
//!
//! ```text
//! ┌────────────┬────────────┬─────────────┬──────────────┬─────────┬─────────────┐
//! │ total len  │ header len │ prelude CRC │ header block │ payload │ message CRC │
//! │  u32 BE    │  u32 BE    │   u32 BE    │              │         │   u32 BE    │
//! └────────────┴────────────┴─────────────┴──────────────┴─────────┴─────────────┘
//! ```
//!
//! Each header is `name_len:u8, name, value_type:u8, value`. Encoding only
//! emits string values (type 7, `value_len:u16 BE` prefix); decoding accepts
//! every value type and renders it as a string.

use crate::error::{Result, VoxlateError};
use std::fmt::Write as _;
use thiserror::Error;

/// Length of the prelude (total length + header block length).
pub const PRELUDE_LEN: usize = 8;
/// Length of each CRC32 checksum.
pub const CRC_LEN: usize = 4;
/// Bytes in every frame that are neither headers nor payload.
pub const FRAME_OVERHEAD: usize = PRELUDE_LEN + 2 * CRC_LEN;
/// Offset of the header block (prelude + prelude CRC).
const HEADERS_OFFSET: usize = PRELUDE_LEN + CRC_LEN;

const TYPE_BOOL_TRUE: u8 = 0;
const TYPE_BOOL_FALSE: u8 = 1;
const TYPE_BYTE: u8 = 2;
const TYPE_SHORT: u8 = 3;
const TYPE_INT: u8 = 4;
const TYPE_LONG: u8 = 5;
const TYPE_BYTES: u8 = 6;
const TYPE_STRING: u8 = 7;
const TYPE_TIMESTAMP: u8 = 8;
const TYPE_UUID: u8 = 9;

/// Reasons an inbound frame is rejected.
///
/// A frame that fails any check is dropped whole; nothing from it is forwarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodeError {
    #[error("frame too short: {length} bytes")]
    TooShort { length: usize },

    #[error("declared length {declared} does not match frame length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("prelude checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    PreludeChecksum { expected: u32, computed: u32 },

    #[error("message checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    MessageChecksum { expected: u32, computed: u32 },

    #[error("header block of {declared} bytes overruns a {available} byte frame body")]
    HeaderOverrun { declared: usize, available: usize },

    #[error("malformed header at offset {offset}")]
    MalformedHeader { offset: usize },

    #[error("unsupported header value type {0}")]
    UnsupportedHeaderType(u8),

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("payload does not match the transcript schema: {message}")]
    Payload { message: String },
}

/// A single `name: value` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A decoded (or to-be-encoded) event-stream message.
///
/// Headers keep wire order so re-encoding a decoded message is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventStreamMessage {
    pub headers: Vec<Header>,
    pub payload: Vec<u8>,
}

impl EventStreamMessage {
    /// Creates a message from headers and payload.
    pub fn new(headers: Vec<Header>, payload: Vec<u8>) -> Self {
        Self { headers, payload }
    }

    /// Returns the value of the first header called `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// Encodes this message into a frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.headers, &self.payload)
    }
}

/// Encodes headers and payload into one checksummed frame.
///
/// # Errors
/// Returns `VoxlateError::FrameEncode` if a header name exceeds 255 bytes, a
/// value exceeds 65535 bytes, or the frame would not fit a u32 length.
pub fn encode(headers: &[Header], payload: &[u8]) -> Result<Vec<u8>> {
    let header_block = encode_headers(headers)?;

    let total_len = FRAME_OVERHEAD + header_block.len() + payload.len();
    let total_u32 = u32::try_from(total_len).map_err(|_| VoxlateError::FrameEncode {
        message: format!("frame of {total_len} bytes exceeds u32 length"),
    })?;
    // header_block.len() < total_len, so this cannot fail once total fits
    let headers_u32 = header_block.len() as u32;

    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&total_u32.to_be_bytes());
    frame.extend_from_slice(&headers_u32.to_be_bytes());

    let prelude_crc = crc32fast::hash(&frame[..PRELUDE_LEN]);
    frame.extend_from_slice(&prelude_crc.to_be_bytes());

    frame.extend_from_slice(&header_block);
    frame.extend_from_slice(payload);

    let message_crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&message_crc.to_be_bytes());

    Ok(frame)
}

fn encode_headers(headers: &[Header]) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    for header in headers {
        let name = header.name.as_bytes();
        let value = header.value.as_bytes();

        let name_len = u8::try_from(name.len()).map_err(|_| VoxlateError::FrameEncode {
            message: format!("header name of {} bytes exceeds 255", name.len()),
        })?;
        let value_len = u16::try_from(value.len()).map_err(|_| VoxlateError::FrameEncode {
            message: format!(
                "value of header {} is {} bytes, exceeds 65535",
                header.name,
                value.len()
            ),
        })?;

        block.push(name_len);
        block.extend_from_slice(name);
        block.push(TYPE_STRING);
        block.extend_from_slice(&value_len.to_be_bytes());
        block.extend_from_slice(value);
    }
    Ok(block)
}

/// Decodes exactly one frame.
///
/// The buffer must hold the whole frame and nothing else. Both checksums are
/// verified before any header is parsed.
pub fn decode(bytes: &[u8]) -> std::result::Result<EventStreamMessage, FrameDecodeError> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(FrameDecodeError::TooShort {
            length: bytes.len(),
        });
    }

    let total_len = read_u32(bytes, 0) as usize;
    let headers_len = read_u32(bytes, 4) as usize;

    if total_len != bytes.len() {
        return Err(FrameDecodeError::LengthMismatch {
            declared: total_len,
            actual: bytes.len(),
        });
    }

    let expected_prelude = read_u32(bytes, PRELUDE_LEN);
    let computed_prelude = crc32fast::hash(&bytes[..PRELUDE_LEN]);
    if expected_prelude != computed_prelude {
        return Err(FrameDecodeError::PreludeChecksum {
            expected: expected_prelude,
            computed: computed_prelude,
        });
    }

    let body_len = total_len - FRAME_OVERHEAD;
    if headers_len > body_len {
        return Err(FrameDecodeError::HeaderOverrun {
            declared: headers_len,
            available: body_len,
        });
    }

    let crc_offset = total_len - CRC_LEN;
    let expected_message = read_u32(bytes, crc_offset);
    let computed_message = crc32fast::hash(&bytes[..crc_offset]);
    if expected_message != computed_message {
        return Err(FrameDecodeError::MessageChecksum {
            expected: expected_message,
            computed: computed_message,
        });
    }

    let payload_offset = HEADERS_OFFSET + headers_len;
    let headers = decode_headers(&bytes[HEADERS_OFFSET..payload_offset])?;
    let payload = bytes[payload_offset..crc_offset].to_vec();

    Ok(EventStreamMessage { headers, payload })
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Cursor over the header block; every read is bounds-checked.
struct HeaderReader<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], FrameDecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.block.len())
            .ok_or(FrameDecodeError::MalformedHeader { offset: self.pos })?;
        let slice = &self.block[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> std::result::Result<u8, FrameDecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, FrameDecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i64(&mut self) -> std::result::Result<i64, FrameDecodeError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_be_bytes(buf))
    }

    fn value(&mut self, value_type: u8) -> std::result::Result<String, FrameDecodeError> {
        let value = match value_type {
            TYPE_BOOL_TRUE => "true".to_string(),
            TYPE_BOOL_FALSE => "false".to_string(),
            TYPE_BYTE => (self.u8()? as i8).to_string(),
            TYPE_SHORT => (self.u16()? as i16).to_string(),
            TYPE_INT => {
                let b = self.take(4)?;
                i32::from_be_bytes([b[0], b[1], b[2], b[3]]).to_string()
            }
            TYPE_LONG | TYPE_TIMESTAMP => self.i64()?.to_string(),
            TYPE_BYTES => {
                let len = self.u16()? as usize;
                to_hex(self.take(len)?)
            }
            TYPE_STRING => {
                let len = self.u16()? as usize;
                std::str::from_utf8(self.take(len)?)
                    .map_err(|_| FrameDecodeError::InvalidUtf8 {
                        field: "header value",
                    })?
                    .to_string()
            }
            TYPE_UUID => {
                let b = self.take(16)?;
                let hex = to_hex(b);
                format!(
                    "{}-{}-{}-{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[12..16],
                    &hex[16..20],
                    &hex[20..32]
                )
            }
            other => return Err(FrameDecodeError::UnsupportedHeaderType(other)),
        };
        Ok(value)
    }
}

fn decode_headers(block: &[u8]) -> std::result::Result<Vec<Header>, FrameDecodeError> {
    let mut reader = HeaderReader { block, pos: 0 };
    let mut headers = Vec::new();

    while reader.pos < block.len() {
        let name_len = reader.u8()? as usize;
        let name = std::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| FrameDecodeError::InvalidUtf8 {
                field: "header name",
            })?
            .to_string();
        let value_type = reader.u8()?;
        let value = reader.value(value_type)?;
        headers.push(Header { name, value });
    }

    Ok(headers)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Builds the outbound AudioEvent frame carrying `pcm` (16-bit LE samples).
pub fn audio_event(pcm: &[u8]) -> Result<Vec<u8>> {
    encode(
        &[
            Header::new(":content-type", "application/octet-stream"),
            Header::new(":event-type", "AudioEvent"),
            Header::new(":message-type", "event"),
        ],
        pcm,
    )
}

/// The zero-payload AudioEvent that tells the service the stream is over.
pub fn end_of_stream() -> Result<Vec<u8>> {
    audio_event(&[])
}
