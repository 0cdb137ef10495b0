//! Duplex streaming session against the transcription endpoint.

use crate::audio::Chunker;
use crate::error::{Result, VoxlateError};
use crate::eventstream::{self, FrameDecodeError, InboundEvent, TranscriptEvent};
use crate::session::state::SessionState;
use crate::session::transport::{Connector, Inbound, Outbound};
use crate::shutdown::Shutdown;
use crate::signing::SignedStreamUrl;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How long `end` waits for the writer to accept end-of-stream and close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// What the session reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Opened,
    Transcript(TranscriptEvent),
    /// A frame failed to decode and was dropped; the session continues.
    DecodeError(FrameDecodeError),
    ServiceException { kind: String, message: String },
    /// Terminal. `remote` is true when the service closed the connection.
    Closed { reason: Option<String>, remote: bool },
}

struct SessionInner {
    state: Mutex<SessionState>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    shutdown: Shutdown,
    event_buffer: usize,
}

/// Handle to one streaming session. Clones share the session.
#[derive(Clone)]
pub struct StreamingSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StreamingSession {
    pub fn new() -> Self {
        Self::with_event_buffer(crate::defaults::EVENT_BUFFER)
    }

    pub fn with_event_buffer(event_buffer: usize) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::Idle),
                outbound: Mutex::new(None),
                reader: Mutex::new(None),
                shutdown: Shutdown::new(),
                event_buffer: event_buffer.max(1),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == SessionState::Streaming
    }

    /// Fires once the session has been ended locally or remotely.
    pub fn shutdown(&self) -> Shutdown {
        self.inner.shutdown.clone()
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = lock(&self.inner.state);
        if *state == from && from.can_transition_to(to) {
            log::debug!("session {} -> {}", from, to);
            *state = to;
            true
        } else {
            false
        }
    }

    fn mark_closed(&self) {
        let mut state = lock(&self.inner.state);
        if *state != SessionState::Closed {
            log::debug!("session {} -> closed", *state);
            *state = SessionState::Closed;
        }
    }

    /// Opens the transport and starts forwarding decoded inbound frames.
    ///
    /// The returned receiver yields `Opened` first and `Closed` last.
    pub async fn begin(
        &self,
        url: &SignedStreamUrl,
        connector: &dyn Connector,
    ) -> Result<mpsc::Receiver<SessionEvent>> {
        if !self.transition(SessionState::Idle, SessionState::Connecting) {
            return Err(VoxlateError::Other(format!(
                "cannot begin a session in state {}",
                self.state()
            )));
        }

        if let Err(e) = url.ensure_fresh(Utc::now()) {
            self.mark_closed();
            self.inner.shutdown.trigger();
            return Err(e);
        }

        log::info!("connecting to {}", url.redacted());
        let transport = match connector.connect(&url.url).await {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("transcription connect failed: {}", e);
                self.mark_closed();
                self.inner.shutdown.trigger();
                return Err(e);
            }
        };

        if !self.transition(SessionState::Connecting, SessionState::Streaming) {
            // end() ran while we were connecting
            let _ = transport.outbound.send(Outbound::Close).await;
            return Err(VoxlateError::Transport {
                message: "session ended while connecting".to_string(),
            });
        }

        *lock(&self.inner.outbound) = Some(transport.outbound);

        let (events_tx, events_rx) = mpsc::channel(self.inner.event_buffer);
        let _ = events_tx.send(SessionEvent::Opened).await;

        let reader = tokio::spawn(read_loop(self.clone(), transport.inbound, events_tx));
        *lock(&self.inner.reader) = Some(reader);

        Ok(events_rx)
    }

    /// Queues a raw frame. Silently dropped unless the session is streaming.
    ///
    /// Waits for room in the outbound channel, but gives up as soon as the
    /// session is ended.
    pub async fn send(&self, frame: Vec<u8>) {
        let sender = {
            if !self.is_streaming() {
                log::trace!("dropping {} byte frame: session not streaming", frame.len());
                return;
            }
            lock(&self.inner.outbound).clone()
        };
        let Some(tx) = sender else {
            return;
        };
        let shutdown = self.shutdown();
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                log::trace!("session ended while waiting for the writer; frame dropped");
            }
            sent = tx.send(Outbound::Frame(frame)) => {
                if sent.is_err() {
                    log::debug!("transport writer gone; frame dropped");
                }
            }
        }
    }

    /// Wraps `pcm` in an AudioEvent frame and sends it.
    pub async fn send_audio(&self, pcm: &[u8]) {
        if pcm.is_empty() {
            return;
        }
        match eventstream::audio_event(pcm) {
            Ok(frame) => self.send(frame).await,
            Err(e) => log::warn!("audio frame not encoded: {}", e),
        }
    }

    /// Sends end-of-stream, closes the transport and moves to `Closed`.
    /// Safe to call in any state, any number of times.
    ///
    /// A writer that does not take the closing frames within
    /// `CLOSE_TIMEOUT` is abandoned; dropping the sender ends it.
    pub async fn end(&self) {
        let sender = {
            let mut state = lock(&self.inner.state);
            match *state {
                SessionState::Closed => return,
                SessionState::Idle | SessionState::Connecting => {
                    *state = SessionState::Closed;
                    None
                }
                SessionState::Streaming | SessionState::Closing => {
                    *state = SessionState::Closing;
                    lock(&self.inner.outbound).take()
                }
            }
        };

        // Detach the reader before the close round-trips.
        self.inner.shutdown.trigger();

        if let Some(tx) = sender {
            let closing = async {
                match eventstream::end_of_stream() {
                    Ok(eos) => {
                        if tx.send(Outbound::Frame(eos)).await.is_err() {
                            log::debug!("end-of-stream not sent: transport already closed");
                        }
                    }
                    Err(e) => log::warn!("end-of-stream not encoded: {}", e),
                }
                let _ = tx.send(Outbound::Close).await;
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
                log::warn!("transport writer stalled; closing without end-of-stream");
            }
            drop(tx);
        }

        self.mark_closed();
        log::info!("transcription session ended");
    }

    /// Awaits the inbound reader task, if one was started.
    pub async fn join(&self) {
        let reader = lock(&self.inner.reader).take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                log::warn!("session reader task failed: {}", e);
            }
        }
    }

    /// Remote close: tear down the writer and finish in `Closed`.
    fn close_from_remote(&self) {
        self.transition(SessionState::Streaming, SessionState::Closing);
        let sender = lock(&self.inner.outbound).take();
        if let Some(tx) = sender {
            if tx.try_send(Outbound::Close).is_err() {
                log::debug!("close not queued; dropping the writer");
            }
        }
        self.mark_closed();
        self.inner.shutdown.trigger();
    }
}

impl Default for StreamingSession {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_loop(
    session: StreamingSession,
    mut inbound: mpsc::Receiver<Inbound>,
    events: mpsc::Sender<SessionEvent>,
) {
    let shutdown = session.shutdown();
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                let _ = events.send(SessionEvent::Closed { reason: None, remote: false }).await;
                return;
            }
            message = inbound.recv() => message,
        };

        let event = match message {
            Some(Inbound::Frame(bytes)) => match decode_event(&bytes) {
                Some(event) => event,
                None => continue,
            },
            Some(Inbound::Closed { reason }) => {
                log::info!(
                    "transcription stream closed by service{}",
                    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
                );
                session.close_from_remote();
                let _ = events.send(SessionEvent::Closed { reason, remote: true }).await;
                return;
            }
            Some(Inbound::Error(message)) => {
                session.close_from_remote();
                let _ = events
                    .send(SessionEvent::Closed {
                        reason: Some(message),
                        remote: true,
                    })
                    .await;
                return;
            }
            None => {
                session.close_from_remote();
                let _ = events
                    .send(SessionEvent::Closed {
                        reason: None,
                        remote: true,
                    })
                    .await;
                return;
            }
        };

        if shutdown.is_triggered() {
            continue;
        }
        if events.send(event).await.is_err() {
            log::debug!("session event receiver dropped");
            return;
        }
    }
}

fn decode_event(bytes: &[u8]) -> Option<SessionEvent> {
    let classified = eventstream::decode(bytes).and_then(|message| InboundEvent::classify(&message));
    match classified {
        Ok(InboundEvent::Transcript(event)) => Some(SessionEvent::Transcript(event)),
        Ok(InboundEvent::Exception { kind, message }) => {
            log::error!("transcription service exception {}: {}", kind, message);
            Some(SessionEvent::ServiceException { kind, message })
        }
        Ok(InboundEvent::Other { event_type }) => {
            log::debug!("ignoring inbound event {:?}", event_type);
            None
        }
        Err(e) => {
            log::warn!("dropping undecodable frame ({} bytes): {}", bytes.len(), e);
            Some(SessionEvent::DecodeError(e))
        }
    }
}

/// Sends newly recorded audio every `interval` until `shutdown` fires or the
/// session closes. Chunks go out in capture order.
pub fn spawn_audio_sender(
    session: StreamingSession,
    mut chunker: Chunker,
    interval: Duration,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let session_closed = session.shutdown();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = session_closed.wait() => break,
                _ = ticker.tick() => {
                    let Some(chunk) = chunker.next_chunk() else {
                        continue;
                    };
                    tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        _ = session.send_audio(&chunk.pcm) => sent += 1,
                    }
                }
            }
        }
        log::debug!("audio sender stopped after {} chunks", sent);
    })
}
