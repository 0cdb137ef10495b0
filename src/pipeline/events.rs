//! Notifications for the front-end.

use crate::pipeline::types::Stage;
use crossbeam_channel::TrySendError;
use serde::{Deserialize, Serialize};

/// Queued events a terminal event may displace before giving up.
const EVICT_ATTEMPTS: usize = 4;

/// Progress of a live translation, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The transcription stream is open.
    TranslateBegin { source: String, target: String },
    /// A stable utterance was recognized.
    Transcription { sequence: u64, text: String },
    Translation {
        sequence: u64,
        source_text: String,
        translated_text: String,
    },
    NowPlaying { sequence: u64, text: String },
    UtteranceFailed {
        sequence: u64,
        stage: Stage,
        reason: String,
    },
    /// The session is over. `reason` is set when it ended on a failure.
    TranslateEnd { reason: Option<String> },
}

impl PipelineEvent {
    /// True for the last event of a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::TranslateEnd { .. })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Non-blocking fan-out of [`PipelineEvent`]s.
///
/// A slow or absent consumer never stalls the pipeline; events that do not
/// fit are dropped. `TranslateEnd` is the exception: on a full sink created
/// with [`EventSink::bounded`] the oldest queued event makes room for it.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<crossbeam_channel::Sender<PipelineEvent>>,
    evict: Option<crossbeam_channel::Receiver<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: crossbeam_channel::Sender<PipelineEvent>) -> Self {
        Self {
            tx: Some(tx),
            evict: None,
        }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Bounded channel pair.
    pub fn bounded(capacity: usize) -> (Self, crossbeam_channel::Receiver<PipelineEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let sink = Self {
            tx: Some(tx),
            evict: Some(rx.clone()),
        };
        (sink, rx)
    }

    pub fn emit(&self, event: PipelineEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) if event.is_terminal() => self.force(tx, event),
            Err(TrySendError::Full(event)) => {
                log::debug!("pipeline event dropped, sink full: {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("pipeline event dropped: no consumer");
            }
        }
    }

    fn force(&self, tx: &crossbeam_channel::Sender<PipelineEvent>, mut event: PipelineEvent) {
        if let Some(evict) = &self.evict {
            for _ in 0..EVICT_ATTEMPTS {
                if let Ok(oldest) = evict.try_recv() {
                    log::debug!("pipeline event evicted for session end: {:?}", oldest);
                }
                match tx.try_send(event) {
                    Ok(()) => return,
                    Err(TrySendError::Full(again)) => event = again,
                    Err(TrySendError::Disconnected(_)) => return,
                }
            }
        }
        log::warn!("session end event not delivered, sink full: {:?}", event);
    }
}
