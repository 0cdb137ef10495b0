//! A live translation session from microphone to speakers.
//!
//! ```text
//! AudioSource → Chunker → StreamingSession ⇄ service
//!                              │
//!                              ▼
//!            AggregatorStation → Orchestrator → PlaybackQueue → AudioPlayer
//! ```

use crate::audio::{ArtifactStore, AudioPlayer, AudioSource, Chunker, ChunkerConfig};
use crate::defaults;
use crate::error::{Result, VoxlateError};
use crate::eventstream::TranscriptEvent;
use crate::languages::{Language, Voice};
use crate::pipeline::aggregator::AggregatorStation;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::events::{EventSink, PipelineEvent};
use crate::pipeline::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::pipeline::playback_queue::PlaybackQueue;
use crate::pipeline::station::StationRunner;
use crate::services::{Synthesizer, Translator};
use crate::session::{Connector, SessionEvent, SessionState, StreamingSession, spawn_audio_sender};
use crate::shutdown::Shutdown;
use crate::signing::{self, Signer};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long `stop` waits for background tasks before detaching them.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub region: String,
    pub source: &'static Language,
    pub target: &'static Language,
    pub voice: &'static Voice,
    pub sample_rate: u32,
    pub send_interval: Duration,
    pub max_in_flight: usize,
    pub event_buffer: usize,
}

impl LiveConfig {
    pub fn new(source: &'static Language, target: &'static Language, voice: &'static Voice) -> Self {
        Self {
            region: defaults::DEFAULT_REGION.to_string(),
            source,
            target,
            voice,
            sample_rate: defaults::SAMPLE_RATE,
            send_interval: Duration::from_millis(defaults::SEND_INTERVAL_MS),
            max_in_flight: defaults::MAX_IN_FLIGHT,
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

/// Everything a live session needs, assembled before `start`.
pub struct LiveTranslation {
    config: LiveConfig,
    signer: Arc<Signer>,
    connector: Arc<dyn Connector>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn AudioPlayer>,
    artifacts: Arc<ArtifactStore>,
    events: EventSink,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl LiveTranslation {
    pub fn new(
        config: LiveConfig,
        signer: Arc<Signer>,
        connector: Arc<dyn Connector>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn AudioPlayer>,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            config,
            signer,
            connector,
            translator,
            synthesizer,
            player,
            artifacts,
            events: EventSink::disabled(),
            error_reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Signs the stream URL, starts capture, opens the session and spawns
    /// every stage. On failure nothing is left running.
    pub async fn start(self, mut source: Box<dyn AudioSource>) -> Result<LiveHandle> {
        let config = self.config;

        if let Err(e) = self.signer.credentials().validate() {
            return Err(fail_before_start(&self.events, e));
        }
        let url = match signing::transcribe_stream_url(
            &self.signer,
            &config.region,
            config.source.transcribe,
            config.sample_rate,
            Utc::now(),
        ) {
            Ok(url) => url,
            Err(e) => return Err(fail_before_start(&self.events, e)),
        };

        if let Err(e) = source.start(config.sample_rate) {
            return Err(fail_before_start(&self.events, e));
        }

        let session = StreamingSession::with_event_buffer(config.event_buffer);
        let session_events = match session.begin(&url, self.connector.as_ref()).await {
            Ok(events) => events,
            Err(e) => {
                if let Err(stop_err) = source.stop() {
                    log::warn!("failed to stop capture: {}", stop_err);
                }
                return Err(fail_before_start(&self.events, e));
            }
        };

        self.events.emit(PipelineEvent::TranslateBegin {
            source: config.source.key.to_string(),
            target: config.target.key.to_string(),
        });
        log::info!(
            "live translation {} -> {} (voice {})",
            config.source.key,
            config.target.key,
            config.voice.id
        );

        let shutdown = Shutdown::new();
        let queue = PlaybackQueue::new(Arc::clone(&self.player), self.events.clone());

        let chunker = Chunker::with_config(
            source.buffer(),
            ChunkerConfig { discard_sent: true },
        );
        let sender = spawn_audio_sender(
            session.clone(),
            chunker,
            config.send_interval,
            shutdown.clone(),
        );

        let (transcript_tx, transcript_rx) = mpsc::channel(config.event_buffer);
        let (stable_tx, stable_rx) = mpsc::channel(config.event_buffer);
        let aggregator = StationRunner::spawn(
            AggregatorStation::new(),
            transcript_rx,
            stable_tx,
            Arc::clone(&self.error_reporter),
            shutdown.clone(),
        );

        let orchestrator = Orchestrator::new(
            OrchestratorConfig {
                source_language: config.source.translate.to_string(),
                target_language: config.target.translate.to_string(),
                voice: config.voice.id.to_string(),
                max_in_flight: config.max_in_flight,
            },
            self.translator,
            self.synthesizer,
            self.artifacts,
            queue.clone(),
        )
        .with_events(self.events.clone())
        .with_error_reporter(Arc::clone(&self.error_reporter))
        .with_shutdown(shutdown.clone())
        .run(stable_rx);

        let inner = Arc::new(LiveInner {
            shutdown,
            session,
            queue,
            source: Mutex::new(Some(source)),
            events: self.events,
            tasks: Mutex::new(vec![sender, orchestrator]),
            aggregator: Mutex::new(Some(aggregator)),
            failure: Mutex::new(None),
        });

        let pump = tokio::spawn(pump_session_events(
            Arc::clone(&inner),
            session_events,
            transcript_tx,
            self.error_reporter,
        ));
        lock(&inner.tasks).push(pump);

        Ok(LiveHandle { inner })
    }
}

fn fail_before_start(events: &EventSink, error: VoxlateError) -> VoxlateError {
    log::error!("live translation failed to start: {}", error);
    events.emit(PipelineEvent::TranslateEnd {
        reason: Some(error.to_string()),
    });
    error
}

struct LiveInner {
    shutdown: Shutdown,
    session: StreamingSession,
    queue: PlaybackQueue,
    source: Mutex<Option<Box<dyn AudioSource>>>,
    events: EventSink,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    aggregator: Mutex<Option<StationRunner>>,
    failure: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LiveInner {
    /// Stops every stage, releases the transport and deletes every pending
    /// artifact. Only the first call does anything.
    async fn teardown(&self, reason: Option<String>) {
        if !self.shutdown.trigger() {
            return;
        }
        if let Some(reason) = &reason {
            log::warn!("live translation ending: {}", reason);
            *lock(&self.failure) = Some(reason.clone());
        }

        // Local cleanup first; the transport may never answer.
        let source = lock(&self.source).take();
        if let Some(mut source) = source {
            if let Err(e) = source.stop() {
                log::warn!("failed to stop capture: {}", e);
            }
        }

        let removed = self.queue.flush();
        if removed > 0 {
            log::debug!("removed {} pending audio artifacts", removed);
        }

        self.session.end().await;

        self.events.emit(PipelineEvent::TranslateEnd { reason });
    }
}

async fn pump_session_events(
    inner: Arc<LiveInner>,
    mut session_events: mpsc::Receiver<SessionEvent>,
    transcripts: mpsc::Sender<TranscriptEvent>,
    reporter: Arc<dyn ErrorReporter>,
) {
    while let Some(event) = session_events.recv().await {
        match event {
            SessionEvent::Opened => log::debug!("transcription stream open"),
            SessionEvent::Transcript(transcript) => {
                if transcripts.send(transcript).await.is_err() {
                    break;
                }
            }
            SessionEvent::DecodeError(e) => {
                reporter.report("Session", &StationError::Recoverable(e.to_string()));
            }
            SessionEvent::ServiceException { kind, message } => {
                let reason = format!("{kind}: {message}");
                reporter.report("Session", &StationError::Fatal(reason.clone()));
                inner.teardown(Some(reason)).await;
                break;
            }
            SessionEvent::Closed { reason, remote } => {
                if remote {
                    let reason = reason.unwrap_or_else(|| "connection closed by service".to_string());
                    inner.teardown(Some(reason)).await;
                }
                break;
            }
        }
    }
}

/// Control handle for a running live session.
#[derive(Clone)]
pub struct LiveHandle {
    inner: Arc<LiveInner>,
}

impl LiveHandle {
    /// Tears the session down and waits for its tasks. Idempotent.
    pub async fn stop(&self) {
        self.inner.teardown(None).await;

        let tasks: Vec<JoinHandle<()>> = lock(&self.inner.tasks).drain(..).collect();
        let aggregator = lock(&self.inner.aggregator).take();
        let joined = tokio::time::timeout(JOIN_TIMEOUT, async {
            for task in tasks {
                if let Err(e) = task.await {
                    log::warn!("live translation task failed: {}", e);
                }
            }
            if let Some(aggregator) = aggregator {
                if let Err(e) = aggregator.join().await {
                    log::warn!("{}", e);
                }
            }
        })
        .await;
        if joined.is_err() {
            log::warn!("shutdown timeout; detaching remaining tasks");
        }
    }

    /// Resolves once the session has ended for any reason.
    pub async fn ended(&self) {
        self.inner.shutdown.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.inner.shutdown.is_triggered()
    }

    /// Why the session ended, if it ended on a failure.
    pub fn failure(&self) -> Option<String> {
        lock(&self.inner.failure).clone()
    }

    pub fn is_capturing(&self) -> bool {
        lock(&self.inner.source).is_some()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    pub fn playback_queue(&self) -> &PlaybackQueue {
        &self.inner.queue
    }
}

impl std::fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHandle")
            .field("running", &self.is_running())
            .field("session", &self.session_state())
            .finish()
    }
}
