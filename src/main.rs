use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use voxlate::app::run_live;
use voxlate::audio::capture::list_devices;
use voxlate::cli::{Cli, Commands, ConfigAction};
use voxlate::config::Config;
use voxlate::languages::{self, LANGUAGES, VOICES};
use voxlate::logging;
use voxlate::signing::{self, Credentials, Signer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    logging::init(
        &logging::level_for(cli.verbose, cli.quiet, &config.logging.level),
        config.logging.format,
    );

    match cli.command {
        None => {
            run_live(config, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Languages) => {
            list_languages(&config);
        }
        Some(Commands::Voices { ref language }) => {
            list_voices(language.as_deref())?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Presign { show_signature }) => {
            presign(&config, show_signature)?;
        }
        Some(Commands::Config { ref action }) => {
            handle_config_command(action, &config, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxlate",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file, environment and flags.
///
/// Priority order (highest first):
/// 1. Command-line flags
/// 2. VOXLATE_* environment variables
/// 3. Custom config path from CLI (--config), or ~/.config/voxlate/config.toml
/// 4. Built-in defaults
///
/// `config` subcommands accept a `--config` path that does not exist yet.
fn load_config(cli: &Cli) -> Result<Config> {
    let creating = matches!(cli.command, Some(Commands::Config { .. }));
    let config = match &cli.config {
        Some(path) if !creating => Config::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        Some(path) => Config::load_or_default(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let mut config = config.with_env_overrides();
    cli.apply_overrides(&mut config);
    Ok(config)
}

fn list_languages(config: &Config) {
    let current = [
        config.languages.source.as_str(),
        config.languages.target.as_str(),
    ];
    println!("Languages:");
    for lang in LANGUAGES {
        let marker = if current
            .iter()
            .any(|c| languages::find_language(c).is_some_and(|l| l.key == lang.key))
        {
            "●".green().to_string()
        } else {
            "○".to_string()
        };
        println!(
            "  {} {:<14} {:<22} {} {} {}",
            marker,
            lang.key,
            lang.display_name,
            lang.transcribe.dimmed(),
            lang.translate.dimmed(),
            format!("(voice: {})", lang.default_voice).dimmed()
        );
    }
}

fn list_voices(language: Option<&str>) -> Result<()> {
    match language {
        Some(name) => {
            let lang = languages::language(name)?;
            println!("Voices for {}:", lang.display_name);
            for voice in languages::voices_for(lang) {
                if voice.id == lang.default_voice {
                    println!("  {} {} ({})", "●".green(), voice.id, voice.locale);
                } else {
                    println!("  ○ {} ({})", voice.id, voice.locale);
                }
            }
        }
        None => {
            println!("Voices:");
            for voice in VOICES {
                println!("  {:<10} {}", voice.id, voice.locale.dimmed());
            }
        }
    }
    Ok(())
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

/// Print a signed transcription URL for the configured source language.
fn presign(config: &Config, show_signature: bool) -> Result<()> {
    let source = config.source_language()?;
    let credentials = Credentials::from_env();
    credentials.validate()?;
    let signer = Signer::new(credentials);

    let signed = signing::transcribe_stream_url(
        &signer,
        &config.aws.region,
        source.transcribe,
        config.audio.sample_rate,
        Utc::now(),
    )?;

    if show_signature {
        println!("{}", signed.url);
    } else {
        println!("{}", signed.redacted());
    }
    eprintln!(
        "{} {}",
        "expires".dimmed(),
        signed.expires_at.to_rfc3339()
    );
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: &ConfigAction,
    config: &Config,
    custom_path: Option<&Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init { force } => {
            Config::init(&config_path, *force)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}
