//! Speaker output.
//!
//! `play` hands back a one-shot receiver that resolves when the clip has
//! finished or was stopped, so waiting for playback is a plain `.await`.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Resolves when playback of one clip ends.
pub type PlaybackDone = oneshot::Receiver<()>;

/// Trait for audio output devices.
pub trait AudioPlayer: Send + Sync {
    /// Starts playing 16-bit mono samples, replacing anything already playing.
    fn play(&self, samples: Vec<i16>, sample_rate: u32) -> Result<PlaybackDone>;

    /// Stops playback. Pending completion receivers resolve.
    fn stop(&self);
}

impl<T: AudioPlayer + ?Sized> AudioPlayer for Arc<T> {
    fn play(&self, samples: Vec<i16>, sample_rate: u32) -> Result<PlaybackDone> {
        (**self).play(samples, sample_rate)
    }

    fn stop(&self) {
        (**self).stop()
    }
}

/// Mock audio player for testing.
///
/// Each clip "plays" for a fixed wall-clock time (5ms unless configured), or
/// until `stop`.
#[derive(Debug, Clone)]
pub struct MockAudioPlayer {
    state: Arc<MockPlayerState>,
    play_duration: Option<Duration>,
    fail_play: bool,
}

#[derive(Debug, Default)]
struct MockPlayerState {
    played: Mutex<Vec<Vec<i16>>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    next_id: AtomicU64,
    stops: AtomicU64,
}

impl MockAudioPlayer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockPlayerState::default()),
            play_duration: Some(Duration::from_millis(5)),
            fail_play: false,
        }
    }

    /// Every clip completes after `duration`.
    pub fn with_play_duration(mut self, duration: Duration) -> Self {
        self.play_duration = Some(duration);
        self
    }

    /// Clips never complete on their own; only `stop` ends them.
    pub fn until_stopped(mut self) -> Self {
        self.play_duration = None;
        self
    }

    pub fn with_play_failure(mut self) -> Self {
        self.fail_play = true;
        self
    }

    /// Clips passed to `play`, in order.
    pub fn played(&self) -> Vec<Vec<i16>> {
        self.state
            .played
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of clips started but not yet completed.
    pub fn playing(&self) -> usize {
        self.state.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn stop_count(&self) -> u64 {
        self.state.stops.load(Ordering::SeqCst)
    }
}

impl Default for MockAudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayer for MockAudioPlayer {
    fn play(&self, samples: Vec<i16>, _sample_rate: u32) -> Result<PlaybackDone> {
        if self.fail_play {
            return Err(crate::error::VoxlateError::Playback {
                message: "mock playback failure".to_string(),
            });
        }
        if let Ok(mut played) = self.state.played.lock() {
            played.push(samples);
        }

        let (tx, rx) = oneshot::channel();
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pending) = self.state.pending.lock() {
            pending.insert(id, tx);
        }

        if let Some(duration) = self.play_duration {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                let sender = state.pending.lock().ok().and_then(|mut p| p.remove(&id));
                if let Some(sender) = sender {
                    let _ = sender.send(());
                }
            });
        }
        Ok(rx)
    }

    fn stop(&self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        let drained: Vec<_> = match self.state.pending.lock() {
            Ok(mut pending) => pending.drain().map(|(_, tx)| tx).collect(),
            Err(_) => Vec::new(),
        };
        for sender in drained {
            let _ = sender.send(());
        }
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_player::CpalPlayer;

#[cfg(feature = "cpal-audio")]
mod cpal_player {
    use super::{AudioPlayer, PlaybackDone};
    use crate::audio::capture::SendableStream;
    use crate::audio::pcm;
    use crate::error::{Result, VoxlateError};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    struct Clip {
        samples: Vec<f32>,
        position: usize,
        done: Option<oneshot::Sender<()>>,
    }

    impl Clip {
        fn finish(&mut self) {
            if let Some(done) = self.done.take() {
                let _ = done.send(());
            }
        }
    }

    /// Plays clips on the default output device.
    pub struct CpalPlayer {
        device: cpal::Device,
        stream: Mutex<Option<SendableStream>>,
        clip: Arc<Mutex<Option<Clip>>>,
    }

    impl CpalPlayer {
        pub fn new() -> Result<Self> {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| VoxlateError::AudioDeviceNotFound {
                    device: "default output".to_string(),
                })?;
            Ok(Self {
                device,
                stream: Mutex::new(None),
                clip: Arc::new(Mutex::new(None)),
            })
        }

        fn build_stream(&self) -> Result<(cpal::Stream, u32)> {
            let config = self
                .device
                .default_output_config()
                .map_err(|e| VoxlateError::Playback {
                    message: format!("Failed to query default output config: {}", e),
                })?;
            let rate = config.sample_rate().0;
            let format = config.sample_format();
            let stream_config: cpal::StreamConfig = config.into();

            let mut last_error = None;
            for candidate in output_formats(format) {
                let built = match candidate {
                    cpal::SampleFormat::I16 => {
                        self.output_stream::<i16>(&stream_config, pcm::f32_to_i16, 0)
                    }
                    _ => self.output_stream::<f32>(&stream_config, |s| s, 0.0),
                };
                match built {
                    Ok(stream) => {
                        if candidate != format {
                            log::debug!("output device prefers {:?}; playing {:?}", format, candidate);
                        }
                        return Ok((stream, rate));
                    }
                    Err(e) => last_error = Some(e),
                }
            }
            Err(VoxlateError::Playback {
                message: format!(
                    "Failed to build output stream: {}",
                    last_error.map(|e| e.to_string()).unwrap_or_default()
                ),
            })
        }

        /// Output stream writing the current clip as `T`, padding with `silence`.
        fn output_stream<T>(
            &self,
            config: &cpal::StreamConfig,
            from_f32: fn(f32) -> T,
            silence: T,
        ) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
        where
            T: cpal::SizedSample + Send + 'static,
        {
            let clip = Arc::clone(&self.clip);
            let channels = (config.channels as usize).max(1);
            self.device.build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut guard = match clip.lock() {
                        Ok(g) => g,
                        Err(_) => {
                            data.fill(silence);
                            return;
                        }
                    };
                    let Some(clip) = guard.as_mut() else {
                        data.fill(silence);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        match clip.samples.get(clip.position).copied() {
                            Some(s) => {
                                frame.fill(from_f32(s));
                                clip.position += 1;
                            }
                            None => frame.fill(silence),
                        }
                    }
                    if clip.position >= clip.samples.len() {
                        clip.finish();
                    }
                },
                |err| log::error!("Audio output stream error: {}", err),
                None,
            )
        }
    }

    /// Sample formats to try for an output device, preferred first.
    pub(super) fn output_formats(preferred: cpal::SampleFormat) -> [cpal::SampleFormat; 2] {
        match preferred {
            cpal::SampleFormat::I16 => [cpal::SampleFormat::I16, cpal::SampleFormat::F32],
            _ => [cpal::SampleFormat::F32, cpal::SampleFormat::I16],
        }
    }

    impl AudioPlayer for CpalPlayer {
        fn play(&self, samples: Vec<i16>, sample_rate: u32) -> Result<PlaybackDone> {
            self.stop();

            let (stream, device_rate) = self.build_stream()?;
            let floats: Vec<f32> = samples.iter().map(|&s| pcm::i16_to_f32(s)).collect();
            let resampled = pcm::resample(&floats, sample_rate, device_rate);

            let (tx, rx) = oneshot::channel();
            {
                let mut clip = self.clip.lock().map_err(|e| VoxlateError::Playback {
                    message: format!("Failed to lock playback state: {}", e),
                })?;
                *clip = Some(Clip {
                    samples: resampled,
                    position: 0,
                    done: Some(tx),
                });
            }

            stream.play().map_err(|e| VoxlateError::Playback {
                message: format!("Failed to start output stream: {}", e),
            })?;
            let mut guard = self.stream.lock().map_err(|e| VoxlateError::Playback {
                message: format!("Failed to lock stream: {}", e),
            })?;
            *guard = Some(SendableStream(stream));
            Ok(rx)
        }

        fn stop(&self) {
            if let Ok(mut stream) = self.stream.lock()
                && let Some(stream) = stream.take()
            {
                let _ = stream.0.pause();
            }
            if let Ok(mut clip) = self.clip.lock()
                && let Some(mut clip) = clip.take()
            {
                clip.finish();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "cpal-audio")]
    #[test]
    fn test_output_formats_fall_back_between_f32_and_i16() {
        use cpal::SampleFormat;
        assert_eq!(
            cpal_player::output_formats(SampleFormat::I16),
            [SampleFormat::I16, SampleFormat::F32]
        );
        assert_eq!(
            cpal_player::output_formats(SampleFormat::F32),
            [SampleFormat::F32, SampleFormat::I16]
        );
        assert_eq!(
            cpal_player::output_formats(SampleFormat::U16),
            [SampleFormat::F32, SampleFormat::I16]
        );
    }

    #[tokio::test]
    async fn test_mock_player_completes_after_duration() {
        let player = MockAudioPlayer::new().with_play_duration(Duration::from_millis(10));
        let done = player.play(vec![1, 2, 3], 16000).unwrap();
        assert_eq!(player.playing(), 1);

        tokio::time::timeout(Duration::from_secs(1), done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.playing(), 0);
        assert_eq!(player.played(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_mock_player_stop_resolves_pending() {
        let player = MockAudioPlayer::new().until_stopped();
        let done = player.play(vec![0; 10], 16000).unwrap();

        player.stop();
        tokio::time::timeout(Duration::from_secs(1), done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.stop_count(), 1);
        assert_eq!(player.playing(), 0);
    }

    #[tokio::test]
    async fn test_mock_player_failure() {
        let player = MockAudioPlayer::new().with_play_failure();
        assert!(player.play(vec![0], 16000).is_err());
        assert!(player.played().is_empty());
    }

    #[tokio::test]
    async fn test_player_trait_object() {
        let player: Arc<dyn AudioPlayer> = Arc::new(MockAudioPlayer::new());
        let done = player.play(vec![5], 16000).unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(1), done).await.is_ok());
    }
}
