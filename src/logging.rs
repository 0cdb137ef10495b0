//! Diagnostic logging for the binary.

use crate::config::LogFormat;
use chrono::Utc;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the global logger once. `RUST_LOG` wins over `default_level`.
///
/// Logs go to stderr so they never mix with command output on stdout.
pub fn init(default_level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

        builder.format(move |buf, record| {
            let ts = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            match format {
                LogFormat::Json => {
                    let obj = serde_json::json!({
                        "ts": ts,
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                }
                LogFormat::Text => {
                    writeln!(
                        buf,
                        "{} {} {} {}",
                        ts,
                        record.level(),
                        record.target(),
                        record.args()
                    )
                }
            }
        });
        builder.target(env_logger::Target::Stderr);

        if builder.try_init().is_err() {
            log::debug!("logger already installed");
        }
    });
}

/// Log filter for the `-q`/`-v` flags.
pub fn level_for(verbose: u8, quiet: bool, configured: &str) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(0, false, "warn"), "warn");
        assert_eq!(level_for(1, false, "warn"), "info");
        assert_eq!(level_for(2, false, "warn"), "debug");
        assert_eq!(level_for(5, false, "warn"), "trace");
        assert_eq!(level_for(3, true, "warn"), "error");
    }

    #[test]
    fn test_init_is_idempotent() {
        init("warn", LogFormat::Json);
        init("debug", LogFormat::Text);
        log::warn!("logging initialized twice without panicking");
    }
}
