//! Live translation entry point.
//!
//! Wires the real collaborators together:
//! microphone → transcription websocket → translate → synthesize → speakers

use crate::audio::capture::{CpalAudioSource, suppress_audio_warnings};
use crate::audio::playback::CpalPlayer;
use crate::audio::{ArtifactStore, AudioSource};
use crate::config::Config;
use crate::error::{Result, VoxlateError};
use crate::output::render_event;
use crate::pipeline::{EventSink, LiveTranslation, PipelineEvent};
use crate::services::{AwsClient, AwsTranslator, PollySynthesizer};
use crate::session::WebSocketConnector;
use crate::signing::{Credentials, Signer};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long to wait for the event printer after the session ended.
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run a live session until Ctrl+C or until the service ends it.
///
/// # Arguments
/// * `config` - Fully merged configuration (file, environment, flags)
/// * `quiet` - Only print failures
/// * `verbosity` - 0 = now playing only, 1+ = transcriptions and translations
///
/// # Returns
/// Ok(()) on a user stop, or the reason the session failed
pub async fn run_live(config: Config, quiet: bool, verbosity: u8) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    let live_config = config.live_config()?;

    let credentials = Credentials::from_env();
    credentials.validate()?;
    let signer = Arc::new(Signer::new(credentials));

    let client = AwsClient::new(Arc::clone(&signer), live_config.region.clone())?;
    let translator = Arc::new(AwsTranslator::new(client.clone()));
    let synthesizer =
        Arc::new(PollySynthesizer::new(client).with_sample_rate(live_config.sample_rate));

    let artifacts = Arc::new(ArtifactStore::new(config.artifact_dir())?);
    match artifacts.sweep() {
        Ok(0) => {}
        Ok(n) => log::info!("removed {} stale audio artifacts", n),
        Err(e) => log::warn!("could not clean artifact directory: {}", e),
    }

    let player = Arc::new(CpalPlayer::new()?);
    let source: Box<dyn AudioSource> =
        Box::new(CpalAudioSource::new(config.audio.device.as_deref())?);

    let (events, event_rx) = EventSink::bounded(live_config.event_buffer);
    let printer = spawn_event_printer(event_rx, quiet, verbosity);

    let handle = LiveTranslation::new(
        live_config,
        signer,
        Arc::new(WebSocketConnector),
        translator,
        synthesizer,
        player,
        artifacts,
    )
    .with_events(events)
    .start(source)
    .await;

    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            wait_for_printer(printer).await;
            return Err(e);
        }
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("failed to wait for Ctrl+C: {}", e);
            }
            if !quiet {
                eprintln!();
            }
        }
        _ = handle.ended() => {}
    }

    handle.stop().await;
    let failure = handle.failure();
    drop(handle);
    wait_for_printer(printer).await;

    match failure {
        Some(reason) => Err(VoxlateError::Other(reason)),
        None => Ok(()),
    }
}

/// Prints events until the session ends or every sender is gone.
fn spawn_event_printer(
    rx: crossbeam_channel::Receiver<PipelineEvent>,
    quiet: bool,
    verbosity: u8,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in rx.iter() {
            render_event(&event, quiet, verbosity);
            if matches!(event, PipelineEvent::TranslateEnd { .. }) {
                break;
            }
        }
    })
}

async fn wait_for_printer(printer: JoinHandle<()>) {
    let joined = tokio::time::timeout(
        PRINTER_DRAIN_TIMEOUT,
        tokio::task::spawn_blocking(move || printer.join()),
    )
    .await;
    if joined.is_err() {
        log::debug!("event printer still running; detaching");
    }
}
