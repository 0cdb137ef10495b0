//! Amazon Translate `TranslateText`.

use crate::error::{Result, VoxlateError};
use crate::services::Translator;
use crate::services::aws::AwsClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "translate";
const TARGET: &str = "AWSShineFrontendService_20170701.TranslateText";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TranslateTextRequest<'a> {
    text: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranslateTextResponse {
    translated_text: String,
}

pub struct AwsTranslator {
    client: AwsClient,
}

impl AwsTranslator {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

fn request_body(text: &str, source: &str, target: &str) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&TranslateTextRequest {
        text,
        source_language_code: source,
        target_language_code: target,
    })?)
}

fn parse_response(body: &[u8]) -> Result<String> {
    let response: TranslateTextResponse =
        serde_json::from_slice(body).map_err(|e| VoxlateError::Translation {
            message: format!("unexpected response body: {e}"),
        })?;
    Ok(response.translated_text)
}

#[async_trait]
impl Translator for AwsTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let body = request_body(text, source, target)?;
        let response = self
            .client
            .post(
                SERVICE,
                "/",
                &[("content-type", CONTENT_TYPE), ("x-amz-target", TARGET)],
                body,
            )
            .await
            .map_err(|e| match e {
                VoxlateError::Transport { message } => VoxlateError::Translation { message },
                other => other,
            })?;

        if !response.is_success() {
            return Err(VoxlateError::Translation {
                message: format!("status {}: {}", response.status, response.body_snippet()),
            });
        }
        parse_response(&response.body)
    }
}
