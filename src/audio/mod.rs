//! Audio capture, chunking, synthesized-speech artifacts and playback.

pub mod artifact;
#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod chunker;
pub mod pcm;
pub mod playback;
pub mod recorder;

pub use artifact::ArtifactStore;
pub use chunker::{AudioChunk, Chunker, ChunkerConfig};
pub use playback::{AudioPlayer, MockAudioPlayer, PlaybackDone};
pub use recorder::{AudioSource, MockAudioSource, RecordBuffer};
