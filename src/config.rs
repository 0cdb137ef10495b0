use crate::defaults;
use crate::error::{Result, VoxlateError};
use crate::languages::{self, Language, Voice};
use crate::pipeline::LiveConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub languages: LanguageConfig,
    pub audio: AudioConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// AWS endpoint configuration. Credentials never live here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
}

/// Language selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    /// Language key or display name of the speaker
    pub source: String,
    /// Language key or display name to translate into
    pub target: String,
    /// Synthesis voice; the target language's default when unset
    pub voice: Option<String>,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub send_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_in_flight: usize,
    /// Where synthesized speech is written; system temp dir when unset
    pub artifact_dir: Option<PathBuf>,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: defaults::DEFAULT_REGION.to_string(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: defaults::DEFAULT_SOURCE_LANGUAGE.to_string(),
            target: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
            voice: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            send_interval_ms: defaults::SEND_INTERVAL_MS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: defaults::MAX_IN_FLIGHT,
            artifact_dir: None,
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> VoxlateError {
    VoxlateError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxlateError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxlateError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(VoxlateError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLATE_REGION → aws.region
    /// - VOXLATE_SOURCE_LANGUAGE → languages.source
    /// - VOXLATE_TARGET_LANGUAGE → languages.target
    /// - VOXLATE_VOICE → languages.voice
    /// - VOXLATE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(region) = std::env::var("VOXLATE_REGION")
            && !region.is_empty()
        {
            self.aws.region = region;
        }

        if let Ok(source) = std::env::var("VOXLATE_SOURCE_LANGUAGE")
            && !source.is_empty()
        {
            self.languages.source = source;
        }

        if let Ok(target) = std::env::var("VOXLATE_TARGET_LANGUAGE")
            && !target.is_empty()
        {
            self.languages.target = target;
        }

        if let Ok(voice) = std::env::var("VOXLATE_VOICE")
            && !voice.is_empty()
        {
            self.languages.voice = Some(voice);
        }

        if let Ok(device) = std::env::var("VOXLATE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            return Err(invalid("aws.region", "must not be empty"));
        }
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.send_interval_ms == 0 {
            return Err(invalid("audio.send_interval_ms", "must be positive"));
        }
        if self.pipeline.max_in_flight == 0 {
            return Err(invalid("pipeline.max_in_flight", "must be at least 1"));
        }
        if self.pipeline.event_buffer == 0 {
            return Err(invalid("pipeline.event_buffer", "must be at least 1"));
        }
        if log::LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(invalid(
                "logging.level",
                format!("unknown level {:?}", self.logging.level),
            ));
        }
        self.source_language()?;
        self.voice()?;
        Ok(())
    }

    pub fn source_language(&self) -> Result<&'static Language> {
        languages::language(&self.languages.source)
    }

    pub fn target_language(&self) -> Result<&'static Language> {
        languages::language(&self.languages.target)
    }

    /// The configured voice, or the target language's default.
    pub fn voice(&self) -> Result<&'static Voice> {
        languages::resolve_voice(self.target_language()?, self.languages.voice.as_deref())
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.pipeline
            .artifact_dir
            .clone()
            .unwrap_or_else(crate::audio::ArtifactStore::default_dir)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.audio.send_interval_ms)
    }

    /// Validates and resolves everything a live session needs.
    pub fn live_config(&self) -> Result<LiveConfig> {
        self.validate()?;
        let mut live = LiveConfig::new(self.source_language()?, self.target_language()?, self.voice()?);
        live.region = self.aws.region.clone();
        live.sample_rate = self.audio.sample_rate;
        live.send_interval = self.send_interval();
        live.max_in_flight = self.pipeline.max_in_flight;
        live.event_buffer = self.pipeline.event_buffer;
        Ok(live)
    }

    /// Serializes as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxlateError::Other(e.to_string()))
    }

    /// Writes the default configuration to `path`, creating parent
    /// directories. Refuses to overwrite an existing file unless `force`.
    pub fn init(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(invalid(
                "config",
                format!("{} already exists (use --force to overwrite)", path.display()),
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, Self::default().to_toml()?)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxlate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("voxlate")
            .join("config.toml")
    }
}
