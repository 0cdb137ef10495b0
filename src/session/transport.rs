//! Duplex byte transport under the streaming session.
//!
//! A [`Connector`] opens a connection and hands back a pair of channels; the
//! session never touches the websocket directly.

use crate::error::{Result, VoxlateError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const CHANNEL_CAPACITY: usize = 64;

/// Toward the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Vec<u8>),
    /// Close the connection after everything queued before it.
    Close,
}

/// From the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Frame(Vec<u8>),
    Closed { reason: Option<String> },
    Error(String),
}

/// An open connection.
#[derive(Debug)]
pub struct Transport {
    pub outbound: mpsc::Sender<Outbound>,
    pub inbound: mpsc::Receiver<Inbound>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Transport>;
}

/// Binary websocket over TLS.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| VoxlateError::Transport {
                message: format!("Connection failed: {}", e),
            })?;
        log::info!("transcription websocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                match msg {
                    Outbound::Frame(bytes) => {
                        if let Err(e) = write.send(Message::Binary(bytes)).await {
                            log::error!("Failed to send frame: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            log::debug!("Close frame not sent: {}", e);
                        }
                        break;
                    }
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            let terminal = loop {
                match read.next().await {
                    Some(Ok(Message::Binary(bytes))) => {
                        if inbound_tx.send(Inbound::Frame(bytes.to_vec())).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("WebSocket connection closed by server");
                        break Inbound::Closed {
                            reason: frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty()),
                        };
                    }
                    Some(Ok(Message::Text(text))) => {
                        log::warn!("Ignoring text message: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("WebSocket error: {}", e);
                        break Inbound::Error(e.to_string());
                    }
                    None => break Inbound::Closed { reason: None },
                }
            };
            let _ = inbound_tx.send(terminal).await;
        });

        Ok(Transport {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// In-memory connector for testing.
///
/// Records everything the session sends and lets the test inject inbound
/// frames or a remote close. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<MockConnectorState>,
    fail_connect: bool,
    stall_writer: bool,
}

#[derive(Debug, Default)]
struct MockConnectorState {
    urls: Mutex<Vec<String>>,
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: Mutex<Option<mpsc::Sender<Inbound>>>,
    scripted: Mutex<Vec<Vec<u8>>>,
    /// Outbound receivers that are held open but never read.
    stalled: Mutex<Vec<mpsc::Receiver<Outbound>>>,
    close_received: AtomicBool,
    connects: AtomicUsize,
    activity: Notify,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `connect` fails with a transport error.
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// The writer never reads: the outbound channel holds one message and
    /// every later send waits forever, like a half-open connection.
    pub fn with_stalled_writer(mut self) -> Self {
        self.stall_writer = true;
        self
    }

    /// Frames delivered right after the connection opens.
    pub fn with_inbound_frames(self, frames: Vec<Vec<u8>>) -> Self {
        if let Ok(mut scripted) = self.state.scripted.lock() {
            scripted.extend(frames);
        }
        self
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.state
            .urls
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Frames received from the session, in order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state
            .sent
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn close_received(&self) -> bool {
        self.state.close_received.load(Ordering::SeqCst)
    }

    /// Delivers a frame as if the service sent it. Returns `false` when
    /// there is no open connection.
    pub async fn inject_frame(&self, frame: Vec<u8>) -> bool {
        self.inject(Inbound::Frame(frame)).await
    }

    /// Closes the connection from the remote side.
    pub async fn close_remote(&self, reason: Option<&str>) -> bool {
        let closed = self
            .inject(Inbound::Closed {
                reason: reason.map(str::to_string),
            })
            .await;
        if let Ok(mut inbound) = self.state.inbound.lock() {
            inbound.take();
        }
        closed
    }

    async fn inject(&self, message: Inbound) -> bool {
        let sender = self.state.inbound.lock().ok().and_then(|i| i.clone());
        match sender {
            Some(tx) => tx.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Waits until at least `count` frames were sent or the close arrived.
    pub async fn wait_for_frames(&self, count: usize) {
        loop {
            let notified = self.state.activity.notified();
            if self.sent_frames().len() >= count || self.close_received() {
                return;
            }
            notified.await;
        }
    }

    /// Waits until the session closes the connection.
    pub async fn wait_for_close(&self) {
        loop {
            let notified = self.state.activity.notified();
            if self.close_received() {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.state.urls.lock() {
            urls.push(url.to_string());
        }
        if self.fail_connect {
            return Err(VoxlateError::Transport {
                message: "mock connection refused".to_string(),
            });
        }

        let outbound_capacity = if self.stall_writer { 1 } else { CHANNEL_CAPACITY };
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(outbound_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

        let scripted: Vec<Vec<u8>> = self
            .state
            .scripted
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default();
        for frame in scripted {
            inbound_tx
                .send(Inbound::Frame(frame))
                .await
                .map_err(|e| VoxlateError::Transport {
                    message: e.to_string(),
                })?;
        }

        if let Ok(mut inbound) = self.state.inbound.lock() {
            *inbound = Some(inbound_tx);
        }

        if self.stall_writer {
            if let Ok(mut stalled) = self.state.stalled.lock() {
                stalled.push(outbound_rx);
            }
            return Ok(Transport {
                outbound: outbound_tx,
                inbound: inbound_rx,
            });
        }

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                match msg {
                    Outbound::Frame(bytes) => {
                        if let Ok(mut sent) = state.sent.lock() {
                            sent.push(bytes);
                        }
                        state.activity.notify_waiters();
                    }
                    Outbound::Close => break,
                }
            }
            state.close_received.store(true, Ordering::SeqCst);
            let remote = state.inbound.lock().ok().and_then(|mut i| i.take());
            if let Some(tx) = remote {
                let _ = tx.send(Inbound::Closed { reason: None }).await;
            }
            state.activity.notify_waiters();
        });

        Ok(Transport {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
