//! Language and voice catalog.
//!
//! Maps a language key or display name to the codes each remote service
//! expects, and lists the synthesis voices available per locale.

use crate::error::{Result, VoxlateError};

/// Service codes for one selectable language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// Stable identifier used in config and on the command line (e.g. "english-us")
    pub key: &'static str,
    pub display_name: &'static str,
    /// Streaming transcription language code
    pub transcribe: &'static str,
    /// Translation language code
    pub translate: &'static str,
    /// Speech synthesis locale
    pub synthesis_locale: &'static str,
    pub default_voice: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: &'static str,
    pub locale: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language {
        key: "chinese",
        display_name: "Chinese",
        transcribe: "zh-CN",
        translate: "zh",
        synthesis_locale: "cmn-CN",
        default_voice: "Zhiyu",
    },
    Language {
        key: "english-au",
        display_name: "English, Australian",
        transcribe: "en-AU",
        translate: "en",
        synthesis_locale: "en-AU",
        default_voice: "Nicole",
    },
    Language {
        key: "english-uk",
        display_name: "English, British",
        transcribe: "en-GB",
        translate: "en",
        synthesis_locale: "en-GB",
        default_voice: "Amy",
    },
    Language {
        key: "english-us",
        display_name: "English, US",
        transcribe: "en-US",
        translate: "en",
        synthesis_locale: "en-US",
        default_voice: "Joanna",
    },
    Language {
        key: "french",
        display_name: "French",
        transcribe: "fr-FR",
        translate: "fr",
        synthesis_locale: "fr-FR",
        default_voice: "Celine",
    },
    Language {
        key: "french-ca",
        display_name: "French, Canadian",
        transcribe: "fr-CA",
        translate: "fr-CA",
        synthesis_locale: "fr-CA",
        default_voice: "Chantal",
    },
    Language {
        key: "german",
        display_name: "German",
        transcribe: "de-DE",
        translate: "de",
        synthesis_locale: "de-DE",
        default_voice: "Marlene",
    },
    Language {
        key: "italian",
        display_name: "Italian",
        transcribe: "it-IT",
        translate: "it",
        synthesis_locale: "it-IT",
        default_voice: "Carla",
    },
    Language {
        key: "japanese",
        display_name: "Japanese",
        transcribe: "ja-JP",
        translate: "ja",
        synthesis_locale: "ja-JP",
        default_voice: "Mizuki",
    },
    Language {
        key: "korean",
        display_name: "Korean",
        transcribe: "ko-KR",
        translate: "ko",
        synthesis_locale: "ko-KR",
        default_voice: "Seoyeon",
    },
    Language {
        key: "portuguese-br",
        display_name: "Portuguese, Brazil",
        transcribe: "pt-BR",
        translate: "pt",
        synthesis_locale: "pt-BR",
        default_voice: "Camila",
    },
    Language {
        key: "spanish",
        display_name: "Spanish",
        transcribe: "es-US",
        translate: "es",
        synthesis_locale: "es-US",
        default_voice: "Penelope",
    },
];

const fn voice(id: &'static str, locale: &'static str) -> Voice {
    Voice { id, locale }
}

pub const VOICES: &[Voice] = &[
    voice("Amy", "en-GB"),
    voice("Bianca", "it-IT"),
    voice("Brian", "en-GB"),
    voice("Camila", "pt-BR"),
    voice("Carla", "it-IT"),
    voice("Celine", "fr-FR"),
    voice("Chantal", "fr-CA"),
    voice("Conchita", "es-ES"),
    voice("Emma", "en-GB"),
    voice("Enrique", "es-ES"),
    voice("Gabrielle", "fr-CA"),
    voice("Giorgio", "it-IT"),
    voice("Hannah", "de-AT"),
    voice("Hans", "de-DE"),
    voice("Joanna", "en-US"),
    voice("Joey", "en-US"),
    voice("Kendra", "en-US"),
    voice("Kimberly", "en-US"),
    voice("Lea", "fr-FR"),
    voice("Lucia", "es-ES"),
    voice("Lupe", "es-US"),
    voice("Marlene", "de-DE"),
    voice("Mathieu", "fr-FR"),
    voice("Matthew", "en-US"),
    voice("Mia", "es-MX"),
    voice("Miguel", "es-US"),
    voice("Mizuki", "ja-JP"),
    voice("Nicole", "en-AU"),
    voice("Olivia", "en-AU"),
    voice("Penelope", "es-US"),
    voice("Ricardo", "pt-BR"),
    voice("Russell", "en-AU"),
    voice("Salli", "en-US"),
    voice("Seoyeon", "ko-KR"),
    voice("Takumi", "ja-JP"),
    voice("Vicki", "de-DE"),
    voice("Vitoria", "pt-BR"),
    voice("Zhiyu", "cmn-CN"),
];

/// Finds a language by key or by case-insensitive display name.
pub fn find_language(name: &str) -> Option<&'static Language> {
    let name = name.trim();
    LANGUAGES
        .iter()
        .find(|l| l.key == name || l.display_name.eq_ignore_ascii_case(name))
}

/// Like [`find_language`], failing with `UnknownLanguage`.
pub fn language(name: &str) -> Result<&'static Language> {
    find_language(name).ok_or_else(|| VoxlateError::UnknownLanguage {
        name: name.to_string(),
    })
}

/// Finds a voice by id, ignoring case.
pub fn find_voice(id: &str) -> Option<&'static Voice> {
    let id = id.trim();
    VOICES.iter().find(|v| v.id.eq_ignore_ascii_case(id))
}

pub fn voice_by_id(id: &str) -> Result<&'static Voice> {
    find_voice(id).ok_or_else(|| VoxlateError::UnknownVoice { name: id.to_string() })
}

fn locale_language(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

/// Voices that can speak `language`: exact-locale voices first, then other
/// regional variants of the same language.
pub fn voices_for(language: &Language) -> Vec<&'static Voice> {
    let prefix = locale_language(language.synthesis_locale);
    let (mut exact, others): (Vec<_>, Vec<_>) = VOICES
        .iter()
        .filter(|v| locale_language(v.locale) == prefix)
        .partition(|v| v.locale == language.synthesis_locale);
    exact.extend(others);
    exact
}

/// Picks the synthesis voice for `language`, honoring an explicit choice.
pub fn resolve_voice(language: &Language, requested: Option<&str>) -> Result<&'static Voice> {
    match requested.filter(|v| !v.trim().is_empty()) {
        Some(id) => voice_by_id(id),
        None => voice_by_id(language.default_voice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_sizes() {
        assert_eq!(LANGUAGES.len(), 12);
        assert_eq!(VOICES.len(), 38);
    }

    #[test]
    fn test_find_by_key_and_display_name() {
        assert_eq!(find_language("french-ca").unwrap().translate, "fr-CA");
        assert_eq!(find_language("english, us").unwrap().key, "english-us");
        assert_eq!(find_language("  Japanese ").unwrap().transcribe, "ja-JP");
        assert!(find_language("klingon").is_none());
    }

    #[test]
    fn test_unknown_language_error() {
        let err = language("klingon").unwrap_err();
        assert!(matches!(err, VoxlateError::UnknownLanguage { ref name } if name == "klingon"));
    }

    #[test]
    fn test_every_default_voice_exists_and_matches_language() {
        for lang in LANGUAGES {
            let voice = find_voice(lang.default_voice)
                .unwrap_or_else(|| panic!("missing voice {}", lang.default_voice));
            assert_eq!(voice.locale, lang.synthesis_locale, "{}", lang.key);
        }
    }

    #[test]
    fn test_unique_keys_and_voice_ids() {
        let keys: HashSet<_> = LANGUAGES.iter().map(|l| l.key).collect();
        assert_eq!(keys.len(), LANGUAGES.len());
        let ids: HashSet<_> = VOICES.iter().map(|v| v.id).collect();
        assert_eq!(ids.len(), VOICES.len());
    }

    #[test]
    fn test_voices_for_puts_exact_locale_first() {
        let spanish = find_language("spanish").unwrap();
        let voices = voices_for(spanish);
        let ids: Vec<_> = voices.iter().map(|v| v.id).collect();
        assert_eq!(&ids[..3], &["Lupe", "Miguel", "Penelope"]);
        assert!(ids.contains(&"Conchita"));
        assert!(ids.contains(&"Mia"));
        assert!(!ids.contains(&"Joanna"));
    }

    #[test]
    fn test_resolve_voice() {
        let german = find_language("german").unwrap();
        assert_eq!(resolve_voice(german, None).unwrap().id, "Marlene");
        assert_eq!(resolve_voice(german, Some("hans")).unwrap().id, "Hans");
        assert_eq!(resolve_voice(german, Some("")).unwrap().id, "Marlene");
        assert!(matches!(
            resolve_voice(german, Some("Nobody")),
            Err(VoxlateError::UnknownVoice { .. })
        ));
    }
}
