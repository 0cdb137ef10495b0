//! Transcript → translation → speech pipeline.

pub mod aggregator;
pub mod error;
pub mod events;
pub mod live;
pub mod orchestrator;
pub mod playback_queue;
pub mod station;
pub mod types;

pub use aggregator::{AggregatorStation, stable_transcript};
pub use error::{ErrorReporter, LogReporter, StationError};
pub use events::{EventSink, PipelineEvent};
pub use live::{LiveConfig, LiveHandle, LiveTranslation};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use playback_queue::{PlaybackQueue, SlotHandle};
pub use station::{Station, StationRunner};
pub use types::{PlaybackItem, Stage, StableTranscript, TranslationUnit};
