//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::pcm;
use crate::audio::recorder::{AudioSource, RecordBuffer};
use crate::error::{Result, VoxlateError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probing makes ALSA/JACK/PipeWire print harmless noise.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub(crate) fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Quiet JACK/ALSA/PipeWire backend probing.
///
/// Must run before the runtime spawns threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never microphones.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// Input device names, filtered, with preferred ones marked `[recommended]`.
///
/// # Errors
/// Returns `VoxlateError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| VoxlateError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// PipeWire, then PulseAudio, then the system default.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxlateError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched behind a Mutex and never from the
/// audio callback thread.
pub(crate) struct SendableStream(pub(crate) cpal::Stream);

unsafe impl Send for SendableStream {}

/// Maps device frames to mono f32 at the session rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Conversion {
    channels: usize,
    from_rate: u32,
    to_rate: u32,
}

impl Conversion {
    fn direct(rate: u32) -> Self {
        Self {
            channels: 1,
            from_rate: rate,
            to_rate: rate,
        }
    }

    fn is_direct(&self) -> bool {
        self.channels <= 1 && self.from_rate == self.to_rate
    }

    fn apply(&self, samples: Vec<f32>) -> Vec<f32> {
        if self.is_direct() {
            return samples;
        }
        let mono = pcm::downmix(&samples, self.channels);
        pcm::resample(&mono, self.from_rate, self.to_rate)
    }
}

/// Microphone capture into a [`RecordBuffer`].
///
/// Tries f32/mono at the requested rate, then i16/mono, then the device's
/// native config with software down-mix and resampling.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Mutex<Option<SendableStream>>,
    buffer: RecordBuffer,
    callbacks: Arc<AtomicU64>,
}

impl CpalAudioSource {
    /// Opens `device_name`, or the best default input when `None`.
    ///
    /// # Errors
    /// `AudioDeviceNotFound` if no such device exists.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| match device_name {
            Some(name) => find_input_device(name),
            None => get_best_default_device(),
        })?;

        Ok(Self {
            device,
            stream: Mutex::new(None),
            buffer: RecordBuffer::new(),
            callbacks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// One input stream feeding the record buffer through `conversion`.
    fn input_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        conversion: Conversion,
        to_f32: fn(T) -> f32,
    ) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + Send + 'static,
    {
        let buffer = self.buffer.clone();
        let callbacks = Arc::clone(&self.callbacks);
        self.device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                callbacks.fetch_add(1, Ordering::Relaxed);
                let samples = data.iter().map(|&s| to_f32(s)).collect();
                buffer.push(&conversion.apply(samples));
            },
            |err| log::error!("capture stream error: {}", err),
            None,
        )
    }

    fn open_stream(&self, sample_rate: u32) -> Result<cpal::Stream> {
        let mono = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let direct = Conversion::direct(sample_rate);

        if let Ok(stream) = self.input_stream::<f32>(&mono, direct, |s| s) {
            return Ok(stream);
        }
        if let Ok(stream) = self.input_stream::<i16>(&mono, direct, pcm::i16_to_f32) {
            return Ok(stream);
        }
        self.open_native_stream(sample_rate)
    }

    /// Device-native rate/channels, converted in software.
    fn open_native_stream(&self, target_rate: u32) -> Result<cpal::Stream> {
        let native = self
            .device
            .default_input_config()
            .map_err(|e| VoxlateError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;

        let conversion = Conversion {
            channels: native.channels() as usize,
            from_rate: native.sample_rate().0,
            to_rate: target_rate,
        };
        log::info!(
            "capturing in native format ({}ch/{}Hz/{:?}), converting to {}Hz mono",
            conversion.channels,
            conversion.from_rate,
            native.sample_format(),
            target_rate
        );

        let config: cpal::StreamConfig = native.clone().into();
        let built = match native.sample_format() {
            cpal::SampleFormat::F32 => self.input_stream::<f32>(&config, conversion, |s| s),
            cpal::SampleFormat::I16 => {
                self.input_stream::<i16>(&config, conversion, pcm::i16_to_f32)
            }
            other => {
                return Err(VoxlateError::AudioCapture {
                    message: format!(
                        "Unsupported native sample format: {:?}. \
                         Try specifying a device with --device.",
                        other
                    ),
                });
            }
        };
        built.map_err(|e| VoxlateError::AudioCapture {
            message: format!("Failed to open native capture stream: {}", e),
        })
    }

    fn stream_slot(&self) -> std::sync::MutexGuard<'_, Option<SendableStream>> {
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exact-name lookup among the input devices.
fn find_input_device(name: &str) -> Result<cpal::Device> {
    let devices = cpal::default_host()
        .input_devices()
        .map_err(|e| VoxlateError::AudioCapture {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

    devices
        .into_iter()
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| VoxlateError::AudioDeviceNotFound {
            device: name.to_string(),
        })
}

fn play(stream: &cpal::Stream) -> Result<()> {
    stream.play().map_err(|e| VoxlateError::AudioCapture {
        message: format!("Failed to start capture stream: {}", e),
    })
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self, sample_rate: u32) -> Result<()> {
        if self.stream_slot().is_some() {
            return Ok(());
        }

        let mut stream = self.open_stream(sample_rate)?;
        play(&stream)?;

        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        std::thread::sleep(std::time::Duration::from_millis(200));
        if self.callbacks.load(Ordering::Relaxed) == 0 {
            log::debug!("no audio after 200ms; reopening in native format");
            drop(stream);
            self.buffer.clear();
            stream = self.open_native_stream(sample_rate)?;
            play(&stream)?;
        }

        *self.stream_slot() = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(stream) = self.stream_slot().take() else {
            return Ok(());
        };
        stream.0.pause().map_err(|e| VoxlateError::AudioCapture {
            message: format!("Failed to stop capture stream: {}", e),
        })
    }

    fn buffer(&self) -> RecordBuffer {
        self.buffer.clone()
    }
}
