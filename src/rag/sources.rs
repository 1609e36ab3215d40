//! Timestamped source links and language-styled answer formatting.

use crate::config::LanguageTemplate;
use crate::index::TranscriptEntry;
use std::collections::HashSet;
use url::Url;

/// Host used for canonical watch links.
pub const WATCH_HOST: &str = "www.youtube.com";

/// Leading markers that mean an answer is already decorated.
const ANSWER_MARKERS: &[&str] = &["📌", "📖", "💡", "✨", "🎯", "❓", "**"];

/// First sentences longer than this are left unbolded.
const MAX_BOLD_CHARS: usize = 180;

/// Canonical watch URL for a video at an offset.
pub fn timestamp_url(video_id: &str, start_sec: u64) -> String {
    format!(
        "https://{}/watch?v={}&t={}s",
        WATCH_HOST, video_id, start_sec
    )
}

/// Replace the time parameter of an existing play URL, keeping every other
/// query parameter in its original order.
pub fn retime_play_url(play_url: &str, start_sec: u64) -> Option<String> {
    let mut url = Url::parse(play_url).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "t")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("t", &format!("{}s", start_sec));

    Some(url.to_string())
}

/// Best link for an entry.
///
/// A video id always produces the canonical form. Without one, the recorded
/// play URL is retimed when an offset is known, or used as-is.
pub fn entry_url(entry: &TranscriptEntry) -> Option<String> {
    let video_id = entry.video_id.trim();
    if !video_id.is_empty() {
        return Some(timestamp_url(video_id, entry.start_sec.unwrap_or(0)));
    }

    let play_url = entry.play_url.as_deref()?;
    match entry.start_sec {
        Some(start) => retime_play_url(play_url, start).or_else(|| Some(play_url.to_string())),
        None => Some(play_url.to_string()),
    }
}

/// Drop repeated URLs, keeping the first occurrence of each.
pub fn dedup_urls<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Builds the user-facing sources block.
#[derive(Debug, Clone)]
pub struct SourceFormatter {
    max_sources: usize,
}

impl SourceFormatter {
    /// Create a formatter showing at most `max_sources` links.
    pub fn new(max_sources: usize) -> Self {
        Self { max_sources }
    }

    /// Deduplicated, capped source list.
    pub fn select(&self, urls: &[String]) -> Vec<String> {
        let mut selected = dedup_urls(urls.iter().cloned());
        selected.truncate(self.max_sources);
        selected
    }

    /// Render a localized, numbered markdown list of links.
    pub fn format_block(&self, urls: &[String], template: &LanguageTemplate) -> String {
        let selected = self.select(urls);
        if selected.is_empty() {
            return String::new();
        }

        let mut lines = vec![template.sources_header.clone()];
        for (i, url) in selected.iter().enumerate() {
            lines.push(format!("  {}. [🎬 {}]({})", i + 1, template.source_link, url));
        }
        lines.join("\n")
    }
}

impl Default for SourceFormatter {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Decorate an answer: leading emoji and a bold first sentence.
pub fn style_answer(text: &str, template: &LanguageTemplate) -> String {
    let text = text.trim();
    if text.is_empty() {
        return template.empty_answer.clone();
    }

    let (marker, body) = if ANSWER_MARKERS.iter().any(|m| text.starts_with(m)) {
        ("", text)
    } else {
        ("📖 ", text)
    };

    let separator = ["۔", "। ", ". "]
        .into_iter()
        .find(|sep| body.contains(sep));

    let body = match separator {
        Some(sep) if !body.starts_with("**") => match body.split_once(sep) {
            Some((first, rest)) if first.chars().count() < MAX_BOLD_CHARS && !first.is_empty() => {
                format!("**{}**{}{}", first, sep, rest)
            }
            _ => body.to_string(),
        },
        _ => body.to_string(),
    };

    format!("{}{}", marker, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::index::tests::entry;
    use crate::language::Language;

    #[test]
    fn test_canonical_url() {
        assert_eq!(
            timestamp_url("abc123", 125),
            "https://www.youtube.com/watch?v=abc123&t=125s"
        );
    }

    #[test]
    fn test_retime_preserves_other_params() {
        let url = retime_play_url(
            "https://www.youtube.com/watch?v=abc&list=PL1&t=30s&index=4",
            125,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://www.youtube.com/watch?v=abc&list=PL1&index=4&t=125s"
        );

        let short = retime_play_url("https://youtu.be/abc?t=30", 7).unwrap();
        assert_eq!(short, "https://youtu.be/abc?t=7s");

        assert!(retime_play_url("not a url", 7).is_none());
    }

    #[test]
    fn test_entry_url_prefers_video_id() {
        let mut e = entry("abc123", 0, 125, "text");
        e.play_url = Some("https://www.youtube.com/watch?v=zzz&t=1s".to_string());
        assert_eq!(
            entry_url(&e).unwrap(),
            "https://www.youtube.com/watch?v=abc123&t=125s"
        );

        e.video_id = String::new();
        assert_eq!(
            entry_url(&e).unwrap(),
            "https://www.youtube.com/watch?v=zzz&t=125s"
        );

        e.play_url = None;
        assert!(entry_url(&e).is_none());
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let urls = vec!["b".to_string(), "a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(dedup_urls(urls), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_format_block_caps_and_localizes() {
        let prompts = Prompts::default();
        let urls: Vec<String> = (0..8).map(|i| timestamp_url("v", i * 10)).collect();
        let formatter = SourceFormatter::new(5);

        let block = formatter.format_block(&urls, prompts.for_language(Language::English));
        assert_eq!(block.lines().count(), 6);
        assert!(block.starts_with(&prompts.en.sources_header));
        assert!(block.contains("  5. [🎬 Watch video](https://www.youtube.com/watch?v=v&t=40s)"));
        assert!(!block.contains("t=50s"));

        let urdu = formatter.format_block(&urls[..1], prompts.for_language(Language::Urdu));
        assert!(urdu.contains(&prompts.ur.source_link));

        assert!(formatter.format_block(&[], &prompts.en).is_empty());
    }

    #[test]
    fn test_style_answer() {
        let prompts = Prompts::default();
        let en = prompts.for_language(Language::English);

        assert_eq!(
            style_answer("Iman is faith. It grows with deeds.", en),
            "📖 **Iman is faith**. It grows with deeds."
        );
        assert_eq!(style_answer("💡 Already styled", en), "💡 Already styled");
        assert_eq!(style_answer("   ", en), en.empty_answer);
        assert_eq!(
            style_answer("ایمان ایک عقیدہ ہے۔ مزید", en),
            "📖 **ایمان ایک عقیدہ ہے**۔ مزید"
        );
    }
}
