//! Retrieval-augmented answering over lecture transcripts.
//!
//! Hits from the evidence index are expanded into an [`EvidenceBundle`],
//! trimmed into a [`PromptPlan`] that fits the model window, answered by an
//! [`AnswerGenerator`] or the [`FallbackExtractor`], and finally linked back
//! to the video moments by the [`SourceFormatter`].

pub mod budget;
pub mod context;
pub mod fallback;
pub mod generator;
pub mod sources;

pub use budget::{HeuristicTokenizer, PromptBudget, PromptPlan, Tokenizer};
pub use context::{AssemblyMode, ContextAssembler, EvidenceBundle};
pub use fallback::FallbackExtractor;
pub use generator::{
    AnswerGenerator, Decoding, ExtractiveOnly, GenerationOptions, GenerationOutcome, Generator,
    OpenAIGenerator, TextGenerationClient, WeakReason,
};
pub use sources::{style_answer, timestamp_url, SourceFormatter};

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("ایمان", 2), "ای");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
