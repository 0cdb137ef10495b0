use crate::error::{Result, VoxlateError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Growing buffer of captured mono `f32` samples.
///
/// Positions are absolute sample counts since capture began. Discarding
/// already-sent samples frees memory without shifting positions.
#[derive(Debug, Clone, Default)]
pub struct RecordBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

#[derive(Debug, Default)]
struct BufferInner {
    samples: Vec<f32>,
    /// Absolute position of `samples[0]`.
    base: usize,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        // Samples are plain data; a panicked writer leaves them usable.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends captured samples.
    pub fn push(&self, samples: &[f32]) {
        self.lock().samples.extend_from_slice(samples);
    }

    /// Absolute position one past the last recorded sample.
    pub fn write_position(&self) -> usize {
        let inner = self.lock();
        inner.base + inner.samples.len()
    }

    /// Copies everything recorded since `offset`.
    ///
    /// Returns the samples and the new offset (the current write position).
    /// An offset that points into discarded audio starts at the oldest
    /// retained sample.
    pub fn read_from(&self, offset: usize) -> (Vec<f32>, usize) {
        let inner = self.lock();
        let end = inner.base + inner.samples.len();
        if offset >= end {
            return (Vec::new(), offset.max(end));
        }
        if offset < inner.base {
            log::warn!(
                "record offset {offset} precedes retained audio at {}; {} samples lost",
                inner.base,
                inner.base - offset
            );
        }
        let start = offset.saturating_sub(inner.base);
        (inner.samples[start..].to_vec(), end)
    }

    /// Drops samples before `offset`.
    pub fn discard_before(&self, offset: usize) {
        let mut inner = self.lock();
        let count = offset
            .saturating_sub(inner.base)
            .min(inner.samples.len());
        if count > 0 {
            inner.samples.drain(..count);
            inner.base += count;
        }
    }

    /// Number of samples currently held in memory.
    pub fn retained(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.base += inner.samples.len();
        inner.samples.clear();
    }
}

/// Trait for audio capture devices.
///
/// A source records into a [`RecordBuffer`] that the chunker reads from;
/// microphone permission is the caller's concern.
pub trait AudioSource: Send {
    /// Start capturing at `sample_rate` Hz mono.
    fn start(&mut self, sample_rate: u32) -> Result<()>;

    /// Stop capturing. Samples already recorded stay in the buffer.
    fn stop(&mut self) -> Result<()>;

    /// Shared handle to the record buffer.
    fn buffer(&self) -> RecordBuffer;
}

/// Mock audio source for testing
///
/// `start` writes the configured samples into the buffer; tests can push more
/// through [`AudioSource::buffer`] to simulate ongoing speech.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    buffer: RecordBuffer,
    is_started: bool,
    sample_rate: Option<u32>,
    samples: Vec<f32>,
    should_fail_start: bool,
    should_fail_stop: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            buffer: RecordBuffer::new(),
            is_started: false,
            sample_rate: None,
            samples: Vec::new(),
            should_fail_start: false,
            should_fail_stop: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Samples recorded as soon as capture starts
    pub fn with_samples(mut self, samples: Vec<f32>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Rate passed to the last successful `start`.
    pub fn started_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self, sample_rate: u32) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxlateError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if !self.is_started {
            self.buffer.push(&self.samples);
        }
        self.is_started = true;
        self.sample_rate = Some(sample_rate);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            return Err(VoxlateError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = false;
        Ok(())
    }

    fn buffer(&self) -> RecordBuffer {
        self.buffer.clone()
    }
}
