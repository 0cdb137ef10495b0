//! Translation and speech synthesis services.
//!
//! The pipeline only sees the [`Translator`] and [`Synthesizer`] traits so the
//! AWS clients can be swapped for the mocks below in tests.

pub mod aws;
pub mod synthesize;
pub mod translate;

pub use aws::AwsClient;
pub use synthesize::PollySynthesizer;
pub use translate::AwsTranslator;

use crate::error::{Result, VoxlateError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Text translation between two language codes.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Synthesized speech as 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Text-to-speech with a named voice.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio>;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        (**self).translate(text, source, target).await
    }
}

#[async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio> {
        (**self).synthesize(text, voice).await
    }
}

/// Mock translator for testing.
///
/// By default returns `"{target}: {text}"`.
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    responses: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    failures: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `translated` when asked to translate `text`.
    pub fn with_response(mut self, text: &str, translated: &str) -> Self {
        self.responses.insert(text.to_string(), translated.to_string());
        self
    }

    /// Sleep before answering for `text`.
    pub fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Fail when asked to translate `text`.
    pub fn with_failure_on(mut self, text: &str) -> Self {
        self.failures.push(text.to_string());
        self
    }

    /// Texts passed to `translate`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.iter().any(|f| f == text) {
            return Err(VoxlateError::Translation {
                message: format!("mock translation failure for {text:?}"),
            });
        }
        Ok(self
            .responses
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("{target}: {text}")))
    }
}

/// Mock synthesizer for testing.
///
/// Produces `samples_per_char` samples per input character at 16kHz.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    samples_per_char: usize,
    delays: HashMap<String, Duration>,
    failures: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self {
            samples_per_char: 16,
            delays: HashMap::new(),
            failures: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples_per_char(mut self, samples: usize) -> Self {
        self.samples_per_char = samples;
        self
    }

    /// Sleep before answering for `text`.
    pub fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Fail when asked to synthesize `text`.
    pub fn with_failure_on(mut self, text: &str) -> Self {
        self.failures.push(text.to_string());
        self
    }

    /// Texts passed to `synthesize`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<SynthesizedAudio> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.iter().any(|f| f == text) {
            return Err(VoxlateError::Synthesis {
                message: format!("mock synthesis failure for {text:?}"),
            });
        }
        let len = text.chars().count() * self.samples_per_char;
        Ok(SynthesizedAudio {
            samples: (0..len).map(|i| ((i % 64) as i16 - 32) * 256).collect(),
            sample_rate: crate::defaults::SAMPLE_RATE,
        })
    }
}
