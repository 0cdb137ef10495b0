//! Reduces the transcript stream to stable utterances.

use crate::eventstream::TranscriptEvent;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::StableTranscript;

/// Forwards the first alternative of the first result, only when that result
/// is final and its text is non-empty. Everything else is dropped.
pub fn stable_transcript(event: &TranscriptEvent) -> Option<StableTranscript> {
    let result = event.transcript.results.first()?;
    if result.is_partial {
        return None;
    }
    let text = result.alternatives.first()?.transcript.trim();
    if text.is_empty() {
        return None;
    }
    Some(StableTranscript {
        text: text.to_string(),
        result_id: result.result_id.clone(),
        start_time: result.start_time,
        end_time: result.end_time,
    })
}

/// [`stable_transcript`] as a pipeline station.
#[derive(Debug, Default)]
pub struct AggregatorStation {
    forwarded: u64,
    dropped: u64,
}

impl AggregatorStation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Station for AggregatorStation {
    type Input = TranscriptEvent;
    type Output = StableTranscript;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
        match stable_transcript(&input) {
            Some(stable) => {
                self.forwarded += 1;
                log::debug!("stable transcript: {:?}", stable.text);
                Ok(Some(stable))
            }
            None => {
                self.dropped += 1;
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Aggregator"
    }

    fn shutdown(&mut self) {
        log::debug!(
            "aggregator forwarded {} results, dropped {}",
            self.forwarded,
            self.dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventstream::{Alternative, Transcript, TranscriptResult};

    fn event(results: Vec<(bool, Vec<&str>)>) -> TranscriptEvent {
        TranscriptEvent {
            transcript: Transcript {
                results: results
                    .into_iter()
                    .map(|(is_partial, alts)| TranscriptResult {
                        is_partial,
                        start_time: 0.5,
                        end_time: 1.25,
                        result_id: Some("r1".to_string()),
                        alternatives: alts
                            .into_iter()
                            .map(|t| Alternative {
                                transcript: t.to_string(),
                                items: vec![],
                            })
                            .collect(),
                        ..Default::default()
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_final_result_forwards_first_alternative() {
        let stable = stable_transcript(&event(vec![(false, vec!["hello", "yellow"])])).unwrap();
        assert_eq!(stable.text, "hello");
        assert_eq!(stable.result_id.as_deref(), Some("r1"));
        assert_eq!(stable.end_time, 1.25);
    }

    #[test]
    fn test_partial_results_are_dropped() {
        assert!(stable_transcript(&event(vec![(true, vec!["hel"])])).is_none());
    }

    #[test]
    fn test_only_first_result_is_considered() {
        assert!(stable_transcript(&event(vec![(true, vec!["a"]), (false, vec!["b"])])).is_none());
    }

    #[test]
    fn test_empty_sets_are_dropped() {
        assert!(stable_transcript(&event(vec![])).is_none());
        assert!(stable_transcript(&event(vec![(false, vec![])])).is_none());
        assert!(stable_transcript(&event(vec![(false, vec!["   "])])).is_none());
    }

    #[test]
    fn test_station_filters() {
        let mut station = AggregatorStation::new();
        assert!(station.process(event(vec![(true, vec!["x"])])).unwrap().is_none());
        let out = station
            .process(event(vec![(false, vec![" done "])]))
            .unwrap()
            .unwrap();
        assert_eq!(out.text, "done");
        assert_eq!(station.name(), "Aggregator");
    }
}
