//! Request signing for the AWS endpoints.

pub mod credentials;
pub mod sigv4;

pub use credentials::Credentials;
pub use sigv4::{PresignRequest, SignedStreamUrl, Signer};

use crate::defaults;
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Host (with port) of the streaming transcription endpoint in `region`.
pub fn transcribe_host(region: &str) -> String {
    format!(
        "transcribestreaming.{region}.amazonaws.com:{}",
        defaults::TRANSCRIBE_PORT
    )
}

/// Presigns the websocket URL for one transcription session.
pub fn transcribe_stream_url(
    signer: &Signer,
    region: &str,
    language_code: &str,
    sample_rate: u32,
    timestamp: DateTime<Utc>,
) -> Result<SignedStreamUrl> {
    let request = PresignRequest {
        scheme: "wss".into(),
        service: "transcribe".into(),
        region: region.into(),
        host: transcribe_host(region),
        path: defaults::TRANSCRIBE_PATH.into(),
        params: vec![
            ("language-code".into(), language_code.into()),
            ("media-encoding".into(), defaults::MEDIA_ENCODING.into()),
            ("sample-rate".into(), sample_rate.to_string()),
        ],
        expires_secs: defaults::PRESIGN_EXPIRY_SECS,
    };
    signer.presign(&request, timestamp)
}
