//! End-to-end live translation over an in-memory transport.

use std::sync::Arc;
use std::time::Duration;
use voxlate::audio::{ArtifactStore, MockAudioPlayer, MockAudioSource};
use voxlate::error::VoxlateError;
use voxlate::eventstream::{Header, decode, encode};
use voxlate::languages;
use voxlate::pipeline::{EventSink, LiveConfig, LiveHandle, LiveTranslation, PipelineEvent};
use voxlate::services::{MockSynthesizer, MockTranslator};
use voxlate::session::{MockConnector, SessionState};
use voxlate::signing::{Credentials, Signer};

fn transcript_frame(text: &str, partial: bool) -> Vec<u8> {
    let json = serde_json::json!({
        "Transcript": {
            "Results": [{
                "Alternatives": [{ "Transcript": text, "Items": [] }],
                "IsPartial": partial,
                "ResultId": format!("r-{text}"),
                "StartTime": 0.0,
                "EndTime": 1.0,
            }]
        }
    });
    encode(
        &[
            Header::new(":event-type", "TranscriptEvent"),
            Header::new(":content-type", "application/json"),
            Header::new(":message-type", "event"),
        ],
        json.to_string().as_bytes(),
    )
    .unwrap()
}

fn exception_frame(kind: &str, message: &str) -> Vec<u8> {
    encode(
        &[
            Header::new(":exception-type", kind),
            Header::new(":content-type", "application/json"),
            Header::new(":message-type", "exception"),
        ],
        serde_json::json!({ "Message": message }).to_string().as_bytes(),
    )
    .unwrap()
}

fn live_config() -> LiveConfig {
    let mut config = LiveConfig::new(
        languages::language("english-us").unwrap(),
        languages::language("spanish").unwrap(),
        languages::voice_by_id("Lucia").unwrap(),
    );
    config.send_interval = Duration::from_millis(10);
    config
}

fn signer() -> Arc<Signer> {
    Arc::new(Signer::new(Credentials::new("AKID", "secret", "token")))
}

struct Harness {
    connector: MockConnector,
    translator: MockTranslator,
    synthesizer: MockSynthesizer,
    player: MockAudioPlayer,
    artifacts: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            connector: MockConnector::new(),
            translator: MockTranslator::new(),
            synthesizer: MockSynthesizer::new().with_samples_per_char(1),
            player: MockAudioPlayer::new(),
            artifacts: tempfile::tempdir().unwrap(),
        }
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.artifacts.path()).unwrap()
    }

    fn live(&self, events: EventSink) -> LiveTranslation {
        LiveTranslation::new(
            live_config(),
            signer(),
            Arc::new(self.connector.clone()),
            Arc::new(self.translator.clone()),
            Arc::new(self.synthesizer.clone()),
            Arc::new(self.player.clone()),
            Arc::new(self.store()),
        )
        .with_events(events)
    }

    async fn start(&self, events: EventSink) -> LiveHandle {
        self.live(events)
            .start(Box::new(MockAudioSource::new()))
            .await
            .unwrap()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn utterances_play_in_the_order_they_were_spoken() {
    let mut harness = Harness::new();
    harness.translator = MockTranslator::new()
        .with_response("one", "a")
        .with_response("two", "bb")
        .with_response("three", "ccc")
        .with_delay("one", Duration::from_millis(150))
        .with_delay("two", Duration::from_millis(60));
    let (events, rx) = EventSink::bounded(64);
    let handle = harness.start(events).await;

    for frame in [
        transcript_frame("on", true),
        transcript_frame("one", false),
        transcript_frame("two", false),
        transcript_frame("thr", true),
        transcript_frame("three", false),
    ] {
        assert!(harness.connector.inject_frame(frame).await);
    }

    wait_until(|| harness.player.played().len() == 3).await;
    let lengths: Vec<usize> = harness.player.played().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![1, 2, 3]);

    handle.stop().await;
    let events: Vec<PipelineEvent> = rx.try_iter().collect();

    assert!(matches!(events.first(), Some(PipelineEvent::TranslateBegin { .. })));
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::TranslateEnd { reason: None })
    );
    let heard: Vec<(u64, &str)> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Transcription { sequence, text } => Some((*sequence, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(heard, vec![(0, "one"), (1, "two"), (2, "three")]);
    let playing: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::NowPlaying { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(playing, vec!["a", "bb", "ccc"]);
}

#[tokio::test]
async fn captured_audio_is_streamed_and_closed_with_end_of_stream() {
    let harness = Harness::new();
    let handle = harness
        .live(EventSink::disabled())
        .start(Box::new(
            MockAudioSource::new().with_samples(vec![0.5; 1600]),
        ))
        .await
        .unwrap();

    harness.connector.wait_for_frames(1).await;
    let first = decode(&harness.connector.sent_frames()[0]).unwrap();
    assert_eq!(first.header(":event-type"), Some("AudioEvent"));
    assert_eq!(first.payload.len(), 3200);

    let url = &harness.connector.connected_urls()[0];
    assert!(url.contains("language-code=en-US"));
    assert!(url.contains("sample-rate=16000"));

    handle.stop().await;
    assert!(harness.connector.close_received());
    assert_eq!(handle.session_state(), SessionState::Closed);
    assert!(!handle.is_capturing());

    let sent = harness.connector.sent_frames();
    let last = decode(sent.last().unwrap()).unwrap();
    assert_eq!(last.header(":event-type"), Some("AudioEvent"));
    assert!(last.payload.is_empty());

    // Nothing is sent after the stream ended.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.connector.sent_frames().len(), sent.len());
}

#[tokio::test]
async fn stop_removes_every_pending_artifact() {
    let mut harness = Harness::new();
    harness.player = MockAudioPlayer::new().until_stopped();
    let handle = harness.start(EventSink::disabled()).await;

    for text in ["first", "second", "third"] {
        harness
            .connector
            .inject_frame(transcript_frame(text, false))
            .await;
    }

    let store = harness.store();
    // One clip stuck playing, two ready behind it.
    wait_until(|| store.list().map(|l| l.len()).unwrap_or(0) == 3).await;
    assert_eq!(harness.player.playing(), 1);

    handle.stop().await;
    handle.stop().await;

    assert!(store.list().unwrap().is_empty());
    assert!(handle.playback_queue().is_flushed());
    assert!(harness.player.stop_count() >= 1);
}

#[tokio::test]
async fn remote_close_tears_the_session_down() {
    let harness = Harness::new();
    let (events, rx) = EventSink::bounded(64);
    let handle = harness.start(events).await;

    assert!(harness.connector.close_remote(Some("idle timeout")).await);
    tokio::time::timeout(Duration::from_secs(2), handle.ended())
        .await
        .unwrap();

    assert!(!handle.is_running());
    assert_eq!(handle.failure().as_deref(), Some("idle timeout"));
    assert!(!handle.is_capturing());

    handle.stop().await;
    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::TranslateEnd {
            reason: Some("idle timeout".to_string())
        })
    );
}

#[tokio::test]
async fn service_exception_ends_the_session_with_its_message() {
    let harness = Harness::new();
    let handle = harness.start(EventSink::disabled()).await;

    harness
        .connector
        .inject_frame(exception_frame(
            "BadRequestException",
            "Your request timed out because no new audio was received.",
        ))
        .await;
    tokio::time::timeout(Duration::from_secs(2), handle.ended())
        .await
        .unwrap();

    let failure = handle.failure().unwrap();
    assert!(failure.starts_with("BadRequestException"));
    assert!(failure.contains("no new audio"));
    harness.connector.wait_for_close().await;
}

#[tokio::test]
async fn missing_credentials_fail_before_connecting() {
    let harness = Harness::new();
    let (events, rx) = EventSink::bounded(8);
    let result = LiveTranslation::new(
        live_config(),
        Arc::new(Signer::new(Credentials::new("AKID", "secret", ""))),
        Arc::new(harness.connector.clone()),
        Arc::new(harness.translator.clone()),
        Arc::new(harness.synthesizer.clone()),
        Arc::new(harness.player.clone()),
        Arc::new(harness.store()),
    )
    .with_events(events)
    .start(Box::new(MockAudioSource::new()))
    .await;

    assert!(matches!(
        result,
        Err(VoxlateError::SigningPrecondition {
            field: "session_token"
        })
    ));
    assert_eq!(harness.connector.connect_count(), 0);
    assert!(matches!(
        rx.try_recv(),
        Ok(PipelineEvent::TranslateEnd { reason: Some(_) })
    ));
}

#[tokio::test]
async fn failed_utterance_does_not_block_later_ones() {
    let mut harness = Harness::new();
    harness.translator = MockTranslator::new()
        .with_response("good", "ok")
        .with_failure_on("bad");
    let (events, rx) = EventSink::bounded(64);
    let handle = harness.start(events).await;

    harness.connector.inject_frame(transcript_frame("bad", false)).await;
    harness.connector.inject_frame(transcript_frame("good", false)).await;

    wait_until(|| harness.player.played().len() == 1).await;
    assert!(handle.is_running());
    handle.stop().await;

    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::UtteranceFailed { sequence: 0, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::NowPlaying { sequence: 1, text } if text == "ok"
    )));
}

#[tokio::test]
async fn stop_completes_when_the_transport_stops_reading() {
    let mut harness = Harness::new();
    harness.connector = MockConnector::new().with_stalled_writer();
    harness.player = MockAudioPlayer::new().until_stopped();
    let handle = harness
        .live(EventSink::disabled())
        .start(Box::new(
            MockAudioSource::new().with_samples(vec![0.25; 3200]),
        ))
        .await
        .unwrap();

    harness
        .connector
        .inject_frame(transcript_frame("hello", false))
        .await;
    let store = harness.store();
    wait_until(|| harness.player.playing() == 1).await;
    assert_eq!(store.list().unwrap().len(), 1);

    tokio::time::timeout(Duration::from_secs(3), handle.stop())
        .await
        .expect("stop hung on a stalled transport");

    assert!(store.list().unwrap().is_empty());
    assert!(harness.player.stop_count() >= 1);
    assert!(!handle.is_capturing());
    assert_eq!(handle.session_state(), SessionState::Closed);
}
