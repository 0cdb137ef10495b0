//! AWS Signature Version 4.
//!
//! Two variants share one signing-key chain:
//! - presigned query (websocket URL for streaming transcription)
//! - `Authorization` header (JSON POSTs to translation and synthesis)

use crate::error::{Result, VoxlateError};
use crate::signing::credentials::Credentials;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SCOPE_TERMINATOR: &str = "aws4_request";
const DATE_FORMAT: &str = "%Y%m%d";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// RFC 3986 unreserved characters stay literal; everything else is `%XX`.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| VoxlateError::Other(format!("HMAC key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Percent-encodes a query key or value.
pub fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE_SET).to_string()
}

/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
}

/// Sorts encoded `key=value` pairs byte-wise and joins them with `&`.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// A connection URL whose query string carries a time-limited signature.
///
/// Signed once per session and never reused after `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedStreamUrl {
    pub url: String,
    pub signature: String,
    pub signed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SignedStreamUrl {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Fails with `SignedUrlExpired` once the URL is past its window.
    pub fn ensure_fresh(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) {
            return Err(VoxlateError::SignedUrlExpired {
                expired_at: self.expires_at.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// The URL with the signature value elided, safe to print or log.
    pub fn redacted(&self) -> String {
        self.url.replace(&self.signature, "<signature>")
    }
}

/// Inputs for a presigned GET.
#[derive(Debug, Clone)]
pub struct PresignRequest {
    pub scheme: String,
    pub service: String,
    pub region: String,
    /// Host including a non-default port, exactly as it will be sent.
    pub host: String,
    pub path: String,
    /// Request-specific parameters (added to the signing parameters).
    pub params: Vec<(String, String)>,
    pub expires_secs: u64,
}

/// Signs requests with a fixed set of credentials.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Produces a presigned URL.
    ///
    /// Deterministic for fixed inputs. Fails before any hashing if a
    /// credential field is empty.
    pub fn presign(
        &self,
        request: &PresignRequest,
        timestamp: DateTime<Utc>,
    ) -> Result<SignedStreamUrl> {
        self.credentials.validate()?;

        let date = timestamp.format(DATE_FORMAT).to_string();
        let amz_date = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let scope = format!(
            "{date}/{}/{}/{SCOPE_TERMINATOR}",
            request.region, request.service
        );

        let mut params: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), ALGORITHM.into()),
            (
                "X-Amz-Credential".into(),
                format!("{}/{scope}", self.credentials.access_key_id),
            ),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), request.expires_secs.to_string()),
            (
                "X-Amz-Security-Token".into(),
                self.credentials.session_token.clone(),
            ),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        params.extend(request.params.iter().cloned());
        let query = canonical_query(&params);

        let canonical_request = format!(
            "GET\n{}\n{query}\nhost:{}\n\nhost\n{}",
            request.path,
            request.host,
            sha256_hex(b"")
        );
        let signature = self.signature(
            &date,
            &amz_date,
            &scope,
            &request.region,
            &request.service,
            &canonical_request,
        )?;

        let expires_at = timestamp + Duration::seconds(request.expires_secs as i64);
        Ok(SignedStreamUrl {
            url: format!(
                "{}://{}{}?{query}&X-Amz-Signature={signature}",
                request.scheme, request.host, request.path
            ),
            signature,
            signed_at: timestamp,
            expires_at,
        })
    }

    /// Signs a request via headers.
    ///
    /// `headers` must include `host` and every header that will be sent and
    /// should be covered. Returns the headers to add: `x-amz-date`,
    /// `x-amz-security-token` and `authorization`.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_headers(
        &self,
        service: &str,
        region: &str,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>> {
        self.credentials.validate()?;

        let date = timestamp.format(DATE_FORMAT).to_string();
        let amz_date = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let scope = format!("{date}/{region}/{service}/{SCOPE_TERMINATOR}");

        let mut all: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        all.push(("x-amz-date".into(), amz_date.clone()));
        all.push((
            "x-amz-security-token".into(),
            self.credentials.session_token.clone(),
        ));
        all.sort();

        let canonical_headers: String = all.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
        let signed_headers = all
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
            sha256_hex(body)
        );
        let signature = self.signature(
            &date,
            &amz_date,
            &scope,
            region,
            service,
            &canonical_request,
        )?;

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );

        Ok(vec![
            ("x-amz-date".into(), amz_date),
            (
                "x-amz-security-token".into(),
                self.credentials.session_token.clone(),
            ),
            ("authorization".into(), authorization),
        ])
    }

    fn signature(
        &self,
        date: &str,
        amz_date: &str,
        scope: &str,
        region: &str,
        service: &str,
        canonical_request: &str,
    ) -> Result<String> {
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );
        log::trace!("SigV4 string to sign:\n{string_to_sign}");

        let key = signing_key(&self.credentials.secret_access_key, date, region, service)?;
        Ok(hex(&hmac_sha256(&key, string_to_sign.as_bytes())?))
    }
}
