//! Terminal rendering of pipeline events.

use crate::pipeline::PipelineEvent;
use owo_colors::OwoColorize;

/// One line for `event`, or `None` when it is not shown at this verbosity.
///
/// Quiet mode keeps failures only. Transcriptions and translations appear
/// from `-v` on; session boundaries and now-playing lines always do.
pub fn format_event(event: &PipelineEvent, quiet: bool, verbosity: u8) -> Option<String> {
    match event {
        PipelineEvent::TranslateBegin { source, target } if !quiet => Some(format!(
            "{} {} → {} (Ctrl+C to stop)",
            "Listening".green().bold(),
            source,
            target
        )),
        PipelineEvent::Transcription { sequence, text } if !quiet && verbosity >= 1 => {
            Some(format!("{} {}", format!("[{sequence}] heard").dimmed(), text))
        }
        PipelineEvent::Translation {
            sequence,
            translated_text,
            ..
        } if !quiet && verbosity >= 1 => Some(format!(
            "{} {}",
            format!("[{sequence}] translated").dimmed(),
            translated_text
        )),
        PipelineEvent::NowPlaying { sequence, text } if !quiet => {
            Some(format!("{} {}", format!("[{sequence}] ▶").cyan(), text))
        }
        PipelineEvent::UtteranceFailed {
            sequence,
            stage,
            reason,
        } => Some(format!(
            "{} {}",
            format!("[{sequence}] {stage} failed:").yellow(),
            reason
        )),
        PipelineEvent::TranslateEnd { reason: Some(reason) } => {
            Some(format!("{} {}", "Session ended:".red().bold(), reason))
        }
        PipelineEvent::TranslateEnd { reason: None } if !quiet => {
            Some("Session ended".dimmed().to_string())
        }
        _ => None,
    }
}

/// Writes the line for `event` to stderr.
pub fn render_event(event: &PipelineEvent, quiet: bool, verbosity: u8) {
    if let Some(line) = format_event(event, quiet, verbosity) {
        eprintln!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn playing() -> PipelineEvent {
        PipelineEvent::NowPlaying {
            sequence: 2,
            text: "hola".to_string(),
        }
    }

    #[test]
    fn test_now_playing_shown_by_default() {
        let line = format_event(&playing(), false, 0).unwrap();
        assert!(line.contains("[2]"));
        assert!(line.ends_with("hola"));
    }

    #[test]
    fn test_transcription_needs_verbose() {
        let event = PipelineEvent::Transcription {
            sequence: 0,
            text: "hello".to_string(),
        };
        assert!(format_event(&event, false, 0).is_none());
        assert!(format_event(&event, false, 1).unwrap().contains("hello"));
    }

    #[test]
    fn test_quiet_keeps_failures_only() {
        assert!(format_event(&playing(), true, 2).is_none());
        assert!(format_event(&PipelineEvent::TranslateEnd { reason: None }, true, 0).is_none());

        let failed = PipelineEvent::UtteranceFailed {
            sequence: 4,
            stage: Stage::Synthesis,
            reason: "status 500".to_string(),
        };
        let line = format_event(&failed, true, 0).unwrap();
        assert!(line.contains("synthesis"));
        assert!(line.contains("status 500"));

        let ended = PipelineEvent::TranslateEnd {
            reason: Some("BadRequestException: bad rate".to_string()),
        };
        assert!(format_event(&ended, true, 0).unwrap().contains("bad rate"));
    }

    #[test]
    fn test_begin_names_languages() {
        let event = PipelineEvent::TranslateBegin {
            source: "english-us".to_string(),
            target: "spanish".to_string(),
        };
        let line = format_event(&event, false, 0).unwrap();
        assert!(line.contains("english-us"));
        assert!(line.contains("spanish"));
    }
}
