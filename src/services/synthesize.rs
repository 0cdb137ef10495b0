//! Amazon Polly `SynthesizeSpeech`, raw PCM output.

use crate::audio::pcm;
use crate::defaults;
use crate::error::{Result, VoxlateError};
use crate::services::aws::AwsClient;
use crate::services::{SynthesizedAudio, Synthesizer};
use async_trait::async_trait;
use serde::Serialize;

const SERVICE: &str = "polly";
const PATH: &str = "/v1/speech";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    output_format: &'a str,
    sample_rate: String,
}

pub struct PollySynthesizer {
    client: AwsClient,
    sample_rate: u32,
}

impl PollySynthesizer {
    pub fn new(client: AwsClient) -> Self {
        Self {
            client,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }

    /// Polly's `pcm` format supports 8000 and 16000 Hz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

fn request_body(text: &str, voice: &str, sample_rate: u32) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SynthesizeSpeechRequest {
        text,
        voice_id: voice,
        output_format: defaults::SYNTHESIS_OUTPUT_FORMAT,
        sample_rate: sample_rate.to_string(),
    })?)
}

#[async_trait]
impl Synthesizer for PollySynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio> {
        let body = request_body(text, voice, self.sample_rate)?;
        let response = self
            .client
            .post(
                SERVICE,
                PATH,
                &[("content-type", "application/json")],
                body,
            )
            .await
            .map_err(|e| match e {
                VoxlateError::Transport { message } => VoxlateError::Synthesis { message },
                other => other,
            })?;

        if !response.is_success() {
            return Err(VoxlateError::Synthesis {
                message: format!("status {}: {}", response.status, response.body_snippet()),
            });
        }

        Ok(SynthesizedAudio {
            samples: pcm::le_bytes_to_i16(&response.body),
            sample_rate: self.sample_rate,
        })
    }
}
