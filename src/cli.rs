//! Command-line interface for voxlate
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Live speech translation
#[derive(Parser, Debug)]
#[command(
    name = "voxlate",
    version,
    about = "Live speech translation: speak in one language, hear another"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Spoken language (key or name, e.g. english-us, German)
    #[arg(long, short = 's', value_name = "LANG")]
    pub source: Option<String>,

    /// Language to translate into (key or name, e.g. spanish, japanese)
    #[arg(long, short = 't', value_name = "LANG")]
    pub target: Option<String>,

    /// Synthesis voice (default: the target language's default voice)
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// AWS region for transcription, translation and synthesis
    #[arg(long, global = true, value_name = "REGION")]
    pub region: Option<String>,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Interval between audio events. Examples: 200ms, 1s
    #[arg(long, short = 'i', value_name = "DURATION", value_parser = parse_interval)]
    pub interval: Option<Duration>,
}

impl Cli {
    /// Applies the live-session flags on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.languages.source = source.clone();
        }
        if let Some(target) = &self.target {
            config.languages.target = target.clone();
        }
        if let Some(voice) = &self.voice {
            config.languages.voice = Some(voice.clone());
        }
        if let Some(region) = &self.region {
            config.aws.region = region.clone();
        }
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(interval) = self.interval {
            config.audio.send_interval_ms = interval.as_millis().max(1) as u64;
        }
    }
}

/// Parse an audio send interval.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`.
fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let duration = match s.parse::<u64>() {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if duration.is_zero() {
        return Err("interval must be positive".to_string());
    }
    Ok(duration)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List supported languages and their service codes
    Languages,

    /// List synthesis voices, optionally only those for one language
    Voices {
        /// Language key or name
        language: Option<String>,
    },

    /// List available audio input devices
    Devices,

    /// Print a presigned transcription URL for the configured source language
    Presign {
        /// Print the signature instead of eliding it
        #[arg(long)]
        show_signature: bool,
    },

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration (file, environment and flags merged)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["voxlate"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.source.is_none());
        assert!(cli.target.is_none());
        assert!(cli.voice.is_none());
        assert!(cli.region.is_none());
        assert!(cli.device.is_none());
        assert!(cli.interval.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_live_options() {
        let cli = Cli::try_parse_from([
            "voxlate",
            "--source",
            "german",
            "-t",
            "Japanese",
            "--voice",
            "Takumi",
            "--region",
            "eu-central-1",
            "--device",
            "hw:0",
            "--interval",
            "100ms",
        ])
        .unwrap();

        assert_eq!(cli.source.as_deref(), Some("german"));
        assert_eq!(cli.target.as_deref(), Some("Japanese"));
        assert_eq!(cli.voice.as_deref(), Some("Takumi"));
        assert_eq!(cli.region.as_deref(), Some("eu-central-1"));
        assert_eq!(cli.device.as_deref(), Some("hw:0"));
        assert_eq!(cli.interval, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "voxlate", "-s", "korean", "--voice", "Seoyeon", "--region", "ap-northeast-2", "-i",
            "1s",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.languages.source, "korean");
        assert_eq!(config.languages.target, "spanish");
        assert_eq!(config.languages.voice.as_deref(), Some("Seoyeon"));
        assert_eq!(config.aws.region, "ap-northeast-2");
        assert_eq!(config.audio.send_interval_ms, 1000);
        assert_eq!(config.audio.device, None);
    }

    #[test]
    fn test_interval_bare_number_is_millis() {
        let cli = Cli::try_parse_from(["voxlate", "-i", "250"]).unwrap();
        assert_eq!(cli.interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_interval_rejects_zero_and_garbage() {
        assert!(Cli::try_parse_from(["voxlate", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["voxlate", "--interval", "soon"]).is_err());
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["voxlate", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_voices_with_language() {
        let cli = Cli::try_parse_from(["voxlate", "voices", "french"]).unwrap();
        match cli.command {
            Some(Commands::Voices { language }) => assert_eq!(language.as_deref(), Some("french")),
            _ => panic!("Expected Voices command"),
        }
    }

    #[test]
    fn test_parse_presign_flags() {
        let cli = Cli::try_parse_from(["voxlate", "presign", "--region", "us-west-2"]).unwrap();
        match cli.command {
            Some(Commands::Presign { show_signature }) => assert!(!show_signature),
            _ => panic!("Expected Presign command"),
        }
        assert_eq!(cli.region.as_deref(), Some("us-west-2"));

        let cli = Cli::try_parse_from(["voxlate", "presign", "--show-signature"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Presign {
                show_signature: true
            })
        ));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["voxlate", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Init { force: true }
            })
        ));

        let cli = Cli::try_parse_from(["voxlate", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli =
            Cli::try_parse_from(["voxlate", "devices", "--config", "/tmp/config.toml", "-q"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["voxlate", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["voxlate", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["voxlate", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
