//! Query language identification.
//!
//! Script detection runs first because it is exact: any Devanagari code point
//! means Hindi, any Arabic-script code point means Urdu. Latin-script text is
//! then checked against a closed list of Roman-Urdu function words, and only
//! after that is a statistical guesser consulted. Short, code-mixed questions
//! ("iman kya hai?") defeat statistical models, so they must never reach one
//! when a cheaper signal exists.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Languages the answer pipeline can respond in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[serde(rename = "ur")]
    Urdu,
    #[serde(rename = "hi")]
    Hindi,
    #[default]
    #[serde(rename = "en")]
    English,
    /// Urdu written in Latin script.
    #[serde(rename = "roman")]
    RomanUrdu,
}

impl Language {
    /// Short tag used in configuration and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Urdu => "ur",
            Language::Hindi => "hi",
            Language::English => "en",
            Language::RomanUrdu => "roman",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ur" | "urdu" => Ok(Language::Urdu),
            "hi" | "hindi" => Ok(Language::Hindi),
            "en" | "english" => Ok(Language::English),
            "roman" | "roman-urdu" | "roman_urdu" => Ok(Language::RomanUrdu),
            _ => Err(format!("Unknown language tag: {}", s)),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Closed-class Roman-Urdu words. Kept free of tokens that are also common
/// English words ("to", "main", "par") so English questions do not trip it.
const ROMAN_URDU_INDICATORS: &[&str] = &[
    "kya", "kyaa", "hai", "hain", "hay", "ka", "ki", "ke", "ko", "se", "mein", "mai", "nahi",
    "nahin", "aur", "ya", "yeh", "ye", "woh", "wo", "kaise", "kaisay", "kyun", "kyon", "kyu",
    "kaun", "kon", "hota", "hoti", "hote", "tha", "thi", "thay", "karna", "karein", "karte",
    "karta", "hum", "tum", "aap", "apna", "apne", "bhi", "sawal", "sawaal", "jawab", "batao",
    "bataiye", "bataen", "kab", "kahan", "kitna", "kitne", "liye", "wala", "wali", "gaya",
    "gayi", "raha", "rahi", "sakta", "sakte", "chahiye", "matlab",
];

/// Minimum number of indicator words before text is classified as Roman Urdu.
const ROMAN_URDU_MIN_MATCHES: usize = 2;

/// A statistical language guesser used when script rules are inconclusive.
pub trait LanguageGuesser: Send + Sync {
    /// Guess an ISO 639 code (either 639-1 or 639-3) for the text.
    fn guess(&self, text: &str) -> Option<String>;
}

/// Guesser backed by the `whatlang` trigram model.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangGuesser;

impl LanguageGuesser for WhatlangGuesser {
    fn guess(&self, text: &str) -> Option<String> {
        whatlang::detect(text).map(|info| info.lang().code().to_string())
    }
}

/// Classifies incoming questions into a supported [`Language`].
#[derive(Clone)]
pub struct LanguageIdentifier {
    guesser: Arc<dyn LanguageGuesser>,
}

impl LanguageIdentifier {
    /// Create an identifier using the default statistical guesser.
    pub fn new() -> Self {
        Self::with_guesser(Arc::new(WhatlangGuesser))
    }

    /// Create an identifier with a custom statistical guesser.
    pub fn with_guesser(guesser: Arc<dyn LanguageGuesser>) -> Self {
        Self { guesser }
    }

    /// Detect the language of a query. Never fails; defaults to English.
    pub fn detect(&self, text: &str) -> Language {
        let text = text.trim();
        if text.is_empty() {
            return Language::English;
        }

        if text.chars().any(is_devanagari) {
            debug!("Devanagari script detected");
            return Language::Hindi;
        }

        if text.chars().any(is_arabic_script) {
            debug!("Arabic script detected");
            return Language::Urdu;
        }

        let matches = roman_urdu_matches(text);
        if matches >= ROMAN_URDU_MIN_MATCHES {
            debug!("Roman Urdu detected ({} indicator words)", matches);
            return Language::RomanUrdu;
        }

        let language = match self.guesser.guess(text) {
            Some(code) => map_guess(&code),
            None => Language::English,
        };
        debug!("Statistical guess: {}", language);
        language
    }
}

impl Default for LanguageIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

fn is_devanagari(c: char) -> bool {
    matches!(c, '\u{0900}'..='\u{097F}' | '\u{A8E0}'..='\u{A8FF}')
}

fn is_arabic_script(c: char) -> bool {
    matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

/// Count whitespace tokens that appear in the Roman-Urdu indicator list.
fn roman_urdu_matches(text: &str) -> usize {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| ROMAN_URDU_INDICATORS.contains(&word.as_str()))
        .count()
}

fn map_guess(code: &str) -> Language {
    match code {
        "hi" | "hin" => Language::Hindi,
        "ur" | "urd" => Language::Urdu,
        _ => Language::English,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGuesser(Option<&'static str>);

    impl LanguageGuesser for FixedGuesser {
        fn guess(&self, _text: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn identifier(guess: Option<&'static str>) -> LanguageIdentifier {
        LanguageIdentifier::with_guesser(Arc::new(FixedGuesser(guess)))
    }

    #[test]
    fn test_devanagari_is_hindi() {
        let id = identifier(Some("eng"));
        assert_eq!(id.detect("ईमान क्या है"), Language::Hindi);
        assert_eq!(id.detect("नमाज़"), Language::Hindi);
    }

    #[test]
    fn test_arabic_script_is_urdu() {
        let id = identifier(Some("eng"));
        assert_eq!(id.detect("نماز کیا ہے؟"), Language::Urdu);
        assert_eq!(id.detect("ایمان"), Language::Urdu);
    }

    #[test]
    fn test_devanagari_wins_over_arabic() {
        let id = identifier(None);
        assert_eq!(id.detect("नमाज़ نماز"), Language::Hindi);
    }

    #[test]
    fn test_roman_urdu_indicators() {
        let id = identifier(Some("eng"));
        assert_eq!(id.detect("iman kya hai?"), Language::RomanUrdu);
        assert_eq!(id.detect("Namaz KYA hota HAI"), Language::RomanUrdu);
    }

    #[test]
    fn test_single_indicator_defers_to_guesser() {
        assert_eq!(identifier(Some("eng")).detect("what is kya"), Language::English);
        assert_eq!(identifier(Some("hin")).detect("what is kya"), Language::Hindi);
    }

    #[test]
    fn test_guesser_mapping() {
        assert_eq!(identifier(Some("urd")).detect("something"), Language::Urdu);
        assert_eq!(identifier(Some("hi")).detect("something"), Language::Hindi);
        assert_eq!(identifier(Some("fra")).detect("quelque chose"), Language::English);
        assert_eq!(identifier(None).detect("???"), Language::English);
    }

    #[test]
    fn test_whatlang_detects_english_sentence() {
        let sentence = "The students listened carefully while the teacher explained the history of the ancient city.";
        assert_eq!(WhatlangGuesser.guess(sentence).as_deref(), Some("eng"));
        assert_eq!(LanguageIdentifier::new().detect(sentence), Language::English);
    }

    #[test]
    fn test_empty_input_is_english() {
        assert_eq!(identifier(Some("hin")).detect(""), Language::English);
        assert_eq!(identifier(Some("hin")).detect("   "), Language::English);
    }

    #[test]
    fn test_language_tags_round_trip() {
        for lang in [Language::Urdu, Language::Hindi, Language::English, Language::RomanUrdu] {
            assert_eq!(lang.tag().parse::<Language>().unwrap(), lang);
        }
    }
}
