//! Signed JSON POSTs to regional AWS endpoints.

use crate::defaults;
use crate::error::{Result, VoxlateError};
use crate::signing::Signer;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// A completed HTTP exchange: status and raw body.
#[derive(Debug)]
pub struct AwsResponse {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
}

impl AwsResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as lossy UTF-8, truncated for error messages.
    pub fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

/// HTTP client shared by the translation and synthesis services.
#[derive(Debug, Clone)]
pub struct AwsClient {
    http: Client,
    signer: Arc<Signer>,
    region: String,
}

impl AwsClient {
    pub fn new(signer: Arc<Signer>, region: impl Into<String>) -> Result<Self> {
        Self::with_timeout(
            signer,
            region,
            Duration::from_secs(defaults::HTTP_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        signer: Arc<Signer>,
        region: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxlateError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            signer,
            region: region.into(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// `{service}.{region}.amazonaws.com`
    pub fn host(&self, service: &str) -> String {
        format!("{service}.{}.amazonaws.com", self.region)
    }

    /// Signs and sends a POST. Non-2xx statuses are returned, not raised;
    /// only transport failures are errors.
    pub async fn post(
        &self,
        service: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<AwsResponse> {
        let host = self.host(service);
        let mut signed: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        signed.push(("host".to_string(), host.clone()));

        let auth = self.signer.sign_headers(
            service,
            &self.region,
            "POST",
            path,
            &signed,
            &body,
            Utc::now(),
        )?;

        let url = format!("https://{host}{path}");
        let mut request = self.http.post(&url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        for (name, value) in &auth {
            request = request.header(name.as_str(), value.as_str());
        }

        log::debug!("POST {url} ({} bytes)", body.len());
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| VoxlateError::Transport {
                message: format!("{service} request failed: {e}"),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| VoxlateError::Transport {
                message: format!("{service} response body: {e}"),
            })?
            .to_vec();
        log::debug!("{service} responded {status} ({} bytes)", body.len());

        Ok(AwsResponse { status, body })
    }
}
