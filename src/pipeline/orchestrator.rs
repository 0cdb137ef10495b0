//! Translate → synthesize for each stable utterance.
//!
//! Utterances are processed concurrently (bounded by a semaphore) but each one
//! reserves its playback slot at submission, so completion order never
//! affects playback order.

use crate::audio::ArtifactStore;
use crate::defaults;
use crate::error::VoxlateError;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::events::{EventSink, PipelineEvent};
use crate::pipeline::playback_queue::{PlaybackQueue, SlotHandle};
use crate::pipeline::types::{Stage, StableTranscript, TranslationUnit};
use crate::services::{Synthesizer, Translator};
use crate::shutdown::Shutdown;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

const STATION_NAME: &str = "Orchestrator";

/// Language codes and voice for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Translation code of the spoken language
    pub source_language: String,
    /// Translation code of the output language
    pub target_language: String,
    pub voice: String,
    /// Maximum utterances in the translate → synthesize chain at once
    pub max_in_flight: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            voice: "Penelope".to_string(),
            max_in_flight: defaults::MAX_IN_FLIGHT,
        }
    }
}

struct Shared {
    config: OrchestratorConfig,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    artifacts: Arc<ArtifactStore>,
    queue: PlaybackQueue,
    events: EventSink,
    reporter: Arc<dyn ErrorReporter>,
    shutdown: Shutdown,
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        artifacts: Arc<ArtifactStore>,
        queue: PlaybackQueue,
    ) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        Self {
            shared: Arc::new(Shared {
                config,
                translator,
                synthesizer,
                artifacts,
                queue,
                events: EventSink::disabled(),
                reporter: Arc::new(LogReporter),
                shutdown: Shutdown::new(),
            }),
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    fn shared_mut(&mut self) -> Option<&mut Shared> {
        Arc::get_mut(&mut self.shared)
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        if let Some(shared) = self.shared_mut() {
            shared.events = events;
        }
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        if let Some(shared) = self.shared_mut() {
            shared.reporter = reporter;
        }
        self
    }

    /// Results that complete after `shutdown` fires are discarded.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        if let Some(shared) = self.shared_mut() {
            shared.shutdown = shutdown;
        }
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.config.max_in_flight.max(1)
    }

    /// Reserves a playback slot for `transcript` and starts its chain.
    ///
    /// Waits for an in-flight permit first. Returns `None` once shut down.
    pub async fn submit(&self, transcript: StableTranscript) -> Option<JoinHandle<()>> {
        let shutdown = &self.shared.shutdown;
        if shutdown.is_triggered() {
            return None;
        }

        let slot = self.shared.queue.reserve();
        self.shared.events.emit(PipelineEvent::Transcription {
            sequence: slot.sequence(),
            text: transcript.text.clone(),
        });
        log::info!("transcribed #{}: {}", slot.sequence(), transcript.text);

        let permit = tokio::select! {
            biased;
            _ = shutdown.wait() => return None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok()?,
        };

        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(async move {
            process_utterance(&shared, slot, transcript.text).await;
            drop(permit);
        }))
    }

    /// Consumes stable transcripts until the channel closes or shutdown,
    /// then waits for in-flight chains to finish.
    pub fn run(self, mut input: mpsc::Receiver<StableTranscript>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let shutdown = self.shared.shutdown.clone();
            loop {
                let transcript = tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    next = input.recv() => match next {
                        Some(t) => t,
                        None => break,
                    },
                };
                if self.submit(transcript).await.is_none() {
                    break;
                }
            }

            let all = self.max_in_flight() as u32;
            if self.permits.acquire_many(all).await.is_err() {
                log::debug!("orchestrator semaphore closed");
            }
            log::debug!("orchestrator stopped");
        })
    }
}

async fn process_utterance(shared: &Shared, slot: SlotHandle, source_text: String) {
    let sequence = slot.sequence();
    let config = &shared.config;

    let translated = tokio::select! {
        biased;
        _ = shared.shutdown.wait() => return,
        result = shared.translator.translate(
            &source_text,
            &config.source_language,
            &config.target_language,
        ) => result,
    };
    let translated = match translated {
        Ok(text) => text.trim().to_string(),
        Err(e) => return fail(shared, slot, Stage::Translation, e),
    };
    if translated.is_empty() {
        log::debug!("utterance {} translated to nothing; skipping", sequence);
        shared.queue.abandon(slot);
        return;
    }

    let unit = TranslationUnit {
        sequence,
        source_text,
        translated_text: translated,
    };
    shared.queue.enqueue(&slot, &unit.translated_text);
    shared.events.emit(PipelineEvent::Translation {
        sequence,
        source_text: unit.source_text.clone(),
        translated_text: unit.translated_text.clone(),
    });

    let audio = tokio::select! {
        biased;
        _ = shared.shutdown.wait() => return,
        result = shared.synthesizer.synthesize(&unit.translated_text, &config.voice) => result,
    };
    let audio = match audio {
        Ok(audio) => audio,
        Err(e) => return fail(shared, slot, Stage::Synthesis, e),
    };
    if shared.shutdown.is_triggered() {
        return;
    }

    let artifact = match shared.artifacts.write(&audio.samples, audio.sample_rate) {
        Ok(path) => path,
        Err(e) => return fail(shared, slot, Stage::Artifact, e),
    };
    shared
        .queue
        .attach_audio(slot, artifact, audio.samples, audio.sample_rate);
}

fn fail(shared: &Shared, slot: SlotHandle, stage: Stage, error: VoxlateError) {
    let sequence = slot.sequence();
    shared.queue.abandon(slot);
    shared.events.emit(PipelineEvent::UtteranceFailed {
        sequence,
        stage,
        reason: error.to_string(),
    });
    shared
        .reporter
        .report(STATION_NAME, &StationError::Recoverable(format!("{stage}: {error}")));
}
