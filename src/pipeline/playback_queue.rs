//! Ordered playback of synthesized speech.
//!
//! Every utterance reserves a slot when it is submitted. Slots are played
//! strictly in reservation order no matter when their audio arrives; a slot
//! that fails is abandoned so it does not block the ones behind it.

use crate::audio::{ArtifactStore, AudioPlayer};
use crate::pipeline::events::{EventSink, PipelineEvent};
use crate::pipeline::types::{PlaybackItem, Stage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug)]
enum Slot {
    Pending { text: Option<String> },
    Ready(PlaybackItem),
    Abandoned,
}

#[derive(Debug, Default)]
struct QueueState {
    slots: BTreeMap<u64, Slot>,
    next_sequence: u64,
    next_to_play: u64,
    /// Artifact of the item currently playing.
    current: Option<PathBuf>,
    draining: bool,
    flushed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.slots.is_empty() && self.current.is_none() && !self.draining
    }

    /// Pops the next playable item, skipping abandoned slots. `None` when
    /// the head slot is still pending or nothing is queued.
    fn pop_ready(&mut self) -> Option<PlaybackItem> {
        loop {
            let head = self.next_to_play;
            match self.slots.get(&head) {
                Some(Slot::Abandoned) => {
                    self.slots.remove(&head);
                    self.next_to_play += 1;
                }
                Some(Slot::Ready(_)) => {
                    self.next_to_play += 1;
                    return match self.slots.remove(&head) {
                        Some(Slot::Ready(item)) => Some(item),
                        _ => None,
                    };
                }
                Some(Slot::Pending { .. }) | None => return None,
            }
        }
    }

    fn head_ready(&self) -> bool {
        let mut sequence = self.next_to_play;
        loop {
            match self.slots.get(&sequence) {
                Some(Slot::Abandoned) => sequence += 1,
                Some(Slot::Ready(_)) => return true,
                _ => return false,
            }
        }
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    player: Arc<dyn AudioPlayer>,
    events: EventSink,
    idle: Notify,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn abandon(&self, sequence: u64) {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(&sequence) {
            *slot = Slot::Abandoned;
        }
        while let Some(Slot::Abandoned) = state.slots.get(&state.next_to_play) {
            let head = state.next_to_play;
            state.slots.remove(&head);
            state.next_to_play += 1;
        }
        let idle = state.is_idle();
        drop(state);
        if idle {
            self.idle.notify_waiters();
        }
    }
}

/// A reserved position in the playback order.
///
/// Dropping the handle without attaching audio abandons the slot.
pub struct SlotHandle {
    sequence: u64,
    queue: Arc<QueueInner>,
    settled: bool,
}

impl SlotHandle {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotHandle")
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        if !self.settled {
            self.queue.abandon(self.sequence);
            kick(&self.queue);
        }
    }
}

/// Starts the drain loop if the head is playable and no loop is running.
fn kick(inner: &Arc<QueueInner>) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        log::warn!("playback queue touched outside a runtime; drain deferred");
        return;
    };
    let mut state = inner.lock();
    if state.flushed || state.draining || !state.head_ready() {
        return;
    }
    state.draining = true;
    drop(state);
    runtime.spawn(drain_loop(Arc::clone(inner)));
}

/// FIFO playback owner. Clones share the queue.
#[derive(Clone)]
pub struct PlaybackQueue {
    inner: Arc<QueueInner>,
}

impl PlaybackQueue {
    pub fn new(player: Arc<dyn AudioPlayer>, events: EventSink) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                player,
                events,
                idle: Notify::new(),
            }),
        }
    }

    /// Reserves the next slot in playback order.
    pub fn reserve(&self) -> SlotHandle {
        let mut state = self.inner.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.slots.insert(sequence, Slot::Pending { text: None });
        SlotHandle {
            sequence,
            queue: Arc::clone(&self.inner),
            settled: false,
        }
    }

    /// Records the translated text for a reserved slot.
    pub fn enqueue(&self, handle: &SlotHandle, translated_text: &str) {
        let mut state = self.inner.lock();
        if let Some(Slot::Pending { text }) = state.slots.get_mut(&handle.sequence) {
            *text = Some(translated_text.to_string());
        }
    }

    /// Hands synthesized audio to the queue, which now owns `artifact`.
    ///
    /// Returns `false` if the queue was flushed meanwhile; the artifact is
    /// then deleted immediately.
    pub fn attach_audio(
        &self,
        mut handle: SlotHandle,
        artifact: PathBuf,
        samples: Vec<i16>,
        sample_rate: u32,
    ) -> bool {
        handle.settled = true;
        let accepted = {
            let mut state = self.inner.lock();
            match state.slots.get(&handle.sequence) {
                Some(Slot::Pending { text }) if !state.flushed => {
                    let item = PlaybackItem {
                        sequence: handle.sequence,
                        translated_text: text.clone().unwrap_or_default(),
                        artifact: artifact.clone(),
                        samples,
                        sample_rate,
                    };
                    state.slots.insert(handle.sequence, Slot::Ready(item));
                    true
                }
                _ => false,
            }
        };

        if accepted {
            kick(&self.inner);
        } else {
            log::debug!(
                "discarding audio for utterance {} after teardown",
                handle.sequence
            );
            remove_artifact(&artifact);
        }
        accepted
    }

    /// Gives up a slot so later utterances are not held back.
    pub fn abandon(&self, mut handle: SlotHandle) {
        handle.settled = true;
        self.inner.abandon(handle.sequence);
        kick(&self.inner);
    }

    /// Slots reserved but not yet played.
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .slots
            .values()
            .filter(|s| !matches!(s, Slot::Abandoned))
            .count()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().is_idle()
    }

    pub fn is_flushed(&self) -> bool {
        self.inner.lock().flushed
    }

    /// Resolves once nothing is queued or playing.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stops playback, deletes every artifact the queue owns and empties it.
    /// Later attachments are discarded. Returns the number of files removed.
    pub fn flush(&self) -> usize {
        let artifacts: Vec<PathBuf> = {
            let mut state = self.inner.lock();
            state.flushed = true;
            let mut paths: Vec<PathBuf> = state.current.take().into_iter().collect();
            for slot in std::mem::take(&mut state.slots).into_values() {
                if let Slot::Ready(item) = slot {
                    paths.push(item.artifact);
                }
            }
            paths
        };

        self.inner.player.stop();
        let removed = artifacts.iter().filter(|p| remove_artifact(p)).count();
        log::debug!("playback queue flushed, {} artifacts removed", removed);
        self.inner.idle.notify_waiters();
        removed
    }
}

impl std::fmt::Debug for PlaybackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("PlaybackQueue")
            .field("slots", &state.slots.len())
            .field("next_to_play", &state.next_to_play)
            .field("playing", &state.current.is_some())
            .field("flushed", &state.flushed)
            .finish()
    }
}

fn remove_artifact(path: &Path) -> bool {
    match ArtifactStore::remove(path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

async fn drain_loop(inner: Arc<QueueInner>) {
    loop {
        let item = {
            let mut state = inner.lock();
            let next = if state.flushed { None } else { state.pop_ready() };
            match next {
                Some(item) => {
                    state.current = Some(item.artifact.clone());
                    item
                }
                None => {
                    state.draining = false;
                    let idle = state.is_idle();
                    drop(state);
                    if idle {
                        inner.idle.notify_waiters();
                    }
                    return;
                }
            }
        };

        inner.events.emit(PipelineEvent::NowPlaying {
            sequence: item.sequence,
            text: item.translated_text.clone(),
        });
        log::info!("now playing #{}: {}", item.sequence, item.translated_text);

        match inner.player.play(item.samples, item.sample_rate) {
            Ok(done) => {
                // Err means the player dropped the sender, which also ends playback.
                let _ = done.await;
            }
            Err(e) => {
                log::warn!("playback of utterance {} failed: {}", item.sequence, e);
                inner.events.emit(PipelineEvent::UtteranceFailed {
                    sequence: item.sequence,
                    stage: Stage::Playback,
                    reason: e.to_string(),
                });
            }
        }

        let finished = inner.lock().current.take();
        if let Some(path) = finished {
            remove_artifact(&path);
        }
    }
}
