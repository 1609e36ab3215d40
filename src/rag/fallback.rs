//! Extractive answers straight from assembled context.

use super::truncate_chars;
use regex::Regex;
use tracing::debug;

/// Lines shorter than this (in characters) are treated as noise.
const MIN_LINE_CHARS: usize = 30;
/// Maximum number of lines combined into one answer.
const MAX_LINES: usize = 3;
/// Character cap on a combined answer.
const MAX_ANSWER_CHARS: usize = 300;
/// Character cap on the single-line last resort.
const MAX_SINGLE_LINE_CHARS: usize = 250;

const SENTENCE_ENDS: &[char] = &['.', '!', '?', '۔', '।'];

/// Builds an answer from context lines with no model involved.
#[derive(Debug, Clone)]
pub struct FallbackExtractor {
    marker: Regex,
    blank_run: Regex,
}

impl FallbackExtractor {
    pub fn new() -> Self {
        // "[01:02 – 01:30]" style range markers, optionally pinned.
        let marker = Regex::new(
            r"(?:📌\s*)?\[\d{1,2}:\d{2}(?::\d{2})?\s*[–—-]\s*\d{1,2}:\d{2}(?::\d{2})?\][ \t]*",
        )
        .expect("Invalid regex");
        let blank_run = Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("Invalid regex");

        Self { marker, blank_run }
    }

    /// Strip timestamp markers and collapse runs of blank lines.
    pub fn clean_context(&self, context: &str) -> String {
        let stripped = self.marker.replace_all(context, "");
        self.blank_run
            .replace_all(&stripped, "\n\n")
            .trim()
            .to_string()
    }

    /// Extract an answer from context. Never returns an empty string;
    /// `placeholder` is used when nothing substantive survives.
    pub fn extract(&self, context: &str, placeholder: &str) -> String {
        let meaningful: Vec<&str> = context
            .lines()
            .map(str::trim)
            .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
            .filter(|line| !is_bracketed(line))
            .take(MAX_LINES)
            .collect();

        if !meaningful.is_empty() {
            let combined = meaningful.join(" ");
            let answer = cut_at_sentence(&combined, MAX_ANSWER_CHARS).trim();
            if !answer.is_empty() {
                debug!("Extracted answer from {} lines", meaningful.len());
                return answer.to_string();
            }
        }

        let first_line = context.lines().map(str::trim).find(|line| {
            line.chars().count() > MIN_LINE_CHARS && !line.starts_with('[')
        });
        if let Some(line) = first_line {
            debug!("Extracted answer from first substantive line");
            return truncate_chars(line, MAX_SINGLE_LINE_CHARS).to_string();
        }

        debug!("No substantive context lines; using placeholder");
        if placeholder.trim().is_empty() {
            "Relevant information is available in the video.".to_string()
        } else {
            placeholder.to_string()
        }
    }
}

impl Default for FallbackExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_bracketed(line: &str) -> bool {
    line.starts_with('[') || line.ends_with(']')
}

/// Cut at the last sentence end within `cap` characters, or hard-cut at `cap`.
fn cut_at_sentence(text: &str, cap: usize) -> &str {
    let capped = truncate_chars(text, cap);
    match capped
        .char_indices()
        .filter(|(_, c)| SENTENCE_ENDS.contains(c))
        .last()
    {
        Some((i, c)) => &capped[..i + c.len_utf8()],
        None => capped,
    }
}
