//! Slices newly recorded audio off the record buffer on each send tick.

use crate::audio::pcm;
use crate::audio::recorder::RecordBuffer;

/// 16-bit little-endian PCM sliced from the record buffer.
///
/// Produced once per tick and consumed immediately by the frame encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub pcm: Vec<u8>,
    /// Absolute sample position of the first sample.
    pub start: usize,
    /// Absolute sample position one past the last sample.
    pub end: usize,
    /// Capture order, starting at 0.
    pub sequence: u64,
}

impl AudioChunk {
    pub fn sample_count(&self) -> usize {
        self.end - self.start
    }

    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        (self.sample_count() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Extracts the samples recorded after `last_offset` as PCM bytes.
///
/// Returns `(bytes, new_offset)`. When nothing new was recorded the bytes
/// are empty and the offset is unchanged.
pub fn next_chunk(buffer: &RecordBuffer, last_offset: usize) -> (Vec<u8>, usize) {
    let (samples, new_offset) = buffer.read_from(last_offset);
    (pcm::f32_to_le_bytes(&samples), new_offset)
}

/// Configuration for the chunker.
#[derive(Debug, Clone, Default)]
pub struct ChunkerConfig {
    /// Drop samples from the record buffer once they are chunked.
    pub discard_sent: bool,
}

/// Tracks the last reported offset across ticks.
pub struct Chunker {
    config: ChunkerConfig,
    buffer: RecordBuffer,
    offset: usize,
    next_sequence: u64,
}

impl Chunker {
    /// Creates a chunker that reports everything recorded from offset 0.
    pub fn new(buffer: RecordBuffer) -> Self {
        Self::with_config(buffer, ChunkerConfig::default())
    }

    pub fn with_config(buffer: RecordBuffer, config: ChunkerConfig) -> Self {
        Self {
            config,
            offset: 0,
            buffer,
            next_sequence: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The chunk recorded since the previous call, or `None` if there is
    /// nothing new. Zero-length deltas never produce a chunk.
    pub fn next_chunk(&mut self) -> Option<AudioChunk> {
        let start = self.offset;
        let (pcm, end) = next_chunk(&self.buffer, start);
        self.offset = end;

        if pcm.is_empty() {
            return None;
        }
        if self.config.discard_sent {
            self.buffer.discard_before(end);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(AudioChunk {
            start: end - pcm.len() / 2,
            end,
            pcm,
            sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_chunk_function_contract() {
        let buffer = RecordBuffer::new();
        buffer.push(&[1.0, -1.0]);

        let (bytes, offset) = next_chunk(&buffer, 0);
        assert_eq!(bytes, vec![0xff, 0x7f, 0x01, 0x80]);
        assert_eq!(offset, 2);

        let (bytes, offset) = next_chunk(&buffer, offset);
        assert!(bytes.is_empty());
        assert_eq!(offset, 2);
    }

    #[test]
    fn test_chunks_follow_capture_order() {
        let buffer = RecordBuffer::new();
        let mut chunker = Chunker::new(buffer.clone());

        buffer.push(&[0.0; 100]);
        let first = chunker.next_chunk().unwrap();
        buffer.push(&[0.0; 50]);
        let second = chunker.next_chunk().unwrap();

        assert_eq!((first.start, first.end, first.sequence), (0, 100, 0));
        assert_eq!((second.start, second.end, second.sequence), (100, 150, 1));
        assert_eq!(second.pcm.len(), 100);
    }

    #[test]
    fn test_no_new_audio_yields_none() {
        let buffer = RecordBuffer::new();
        let mut chunker = Chunker::new(buffer.clone());
        assert!(chunker.next_chunk().is_none());

        buffer.push(&[0.1]);
        assert!(chunker.next_chunk().is_some());
        assert!(chunker.next_chunk().is_none());
        assert_eq!(chunker.offset(), 1);
    }

    #[test]
    fn test_discard_sent_bounds_memory() {
        let buffer = RecordBuffer::new();
        let mut chunker =
            Chunker::with_config(buffer.clone(), ChunkerConfig { discard_sent: true });

        for _ in 0..10 {
            buffer.push(&[0.2; 1600]);
            let chunk = chunker.next_chunk().unwrap();
            assert_eq!(chunk.sample_count(), 1600);
        }
        assert_eq!(buffer.retained(), 0);
        assert_eq!(buffer.write_position(), 16000);
    }

    #[test]
    fn test_chunk_duration() {
        let buffer = RecordBuffer::new();
        let mut chunker = Chunker::new(buffer.clone());
        buffer.push(&[0.0; 3200]);
        assert_eq!(chunker.next_chunk().unwrap().duration_ms(16000), 200);
    }
}
