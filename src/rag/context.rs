//! Context assembly: turn ranked hits into a bounded evidence bundle.

use super::sources::entry_url;
use super::truncate_chars;
use crate::index::{IndexSnapshot, SearchHit, TranscriptEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// How hits are turned into evidence blocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyMode {
    /// Expand each hit with its corpus neighbours.
    #[default]
    Windowed,
    /// Use hit text directly, one capped block per hit.
    Flat,
}

impl std::str::FromStr for AssemblyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windowed" | "window" => Ok(AssemblyMode::Windowed),
            "flat" => Ok(AssemblyMode::Flat),
            _ => Err(format!("Unknown assembly mode: {}", s)),
        }
    }
}

/// Deduplicated, ordered evidence for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceBundle {
    /// Evidence text in retrieval rank order.
    pub ordered_text_blocks: Vec<String>,
    /// Links for the hits that contributed, best-first, no duplicates.
    pub source_urls: Vec<String>,
    /// `title [time range] url` lines for the same hits.
    pub meta_lines: Vec<String>,
}

impl EvidenceBundle {
    /// Whether no evidence was assembled.
    pub fn is_empty(&self) -> bool {
        self.ordered_text_blocks.is_empty()
    }

    /// All blocks joined into one context string.
    pub fn context_text(&self) -> String {
        self.ordered_text_blocks.join("\n")
    }
}

/// Identity of a transcript span for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SpanKey {
    Timestamp(String, u64),
    Corpus(usize),
}

fn span_key(entry: &TranscriptEntry, corpus_index: usize) -> SpanKey {
    match entry.start_sec {
        Some(start) => SpanKey::Timestamp(entry.video_id.clone(), start),
        None => SpanKey::Corpus(corpus_index),
    }
}

/// Builds evidence bundles from search hits.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    mode: AssemblyMode,
    window: usize,
    max_context_chars: usize,
    max_block_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with default settings (windowed, window 2).
    pub fn new() -> Self {
        Self {
            mode: AssemblyMode::Windowed,
            window: 2,
            max_context_chars: 900,
            max_block_chars: 1500,
        }
    }

    /// Set the assembly mode.
    pub fn with_mode(mut self, mode: AssemblyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the neighbour window for windowed mode.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Set the total character cap for windowed mode.
    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    /// Set the per-block character cap for flat mode.
    pub fn with_max_block_chars(mut self, max_block_chars: usize) -> Self {
        self.max_block_chars = max_block_chars;
        self
    }

    /// Assemble evidence from best-first hits against the snapshot they came from.
    pub fn assemble(&self, hits: &[SearchHit], corpus: &IndexSnapshot) -> EvidenceBundle {
        let bundle = match self.mode {
            AssemblyMode::Windowed => self.windowed(hits, corpus),
            AssemblyMode::Flat => self.flat(hits),
        };
        debug!(
            "Assembled {} blocks and {} sources from {} hits",
            bundle.ordered_text_blocks.len(),
            bundle.source_urls.len(),
            hits.len()
        );
        bundle
    }

    fn windowed(&self, hits: &[SearchHit], corpus: &IndexSnapshot) -> EvidenceBundle {
        let mut blocks = Vec::new();
        let mut included: HashSet<usize> = HashSet::new();
        let mut seen: HashSet<SpanKey> = HashSet::new();
        let mut total_chars = 0;
        let last = corpus.len().saturating_sub(1);

        'hits: for hit in hits {
            let i = hit.corpus_index;
            if i >= corpus.len() {
                warn!("Hit references corpus index {} outside snapshot", i);
                continue;
            }

            for j in i.saturating_sub(self.window)..=(i + self.window).min(last) {
                if included.contains(&j) {
                    continue;
                }
                let Some(entry) = corpus.entry(j) else {
                    continue;
                };
                let text = entry.text.trim();
                if text.is_empty() || !seen.insert(span_key(entry, j)) {
                    continue;
                }

                included.insert(j);
                blocks.push(text.to_string());
                total_chars += text.chars().count();

                if total_chars >= self.max_context_chars {
                    break 'hits;
                }
            }
        }

        let contributing = hits.iter().filter(|hit| included.contains(&hit.corpus_index));
        let (source_urls, meta_lines) = describe_sources(contributing.map(|hit| &hit.entry));

        EvidenceBundle {
            ordered_text_blocks: blocks,
            source_urls,
            meta_lines,
        }
    }

    fn flat(&self, hits: &[SearchHit]) -> EvidenceBundle {
        let mut blocks = Vec::new();
        let mut contributing = Vec::new();
        let mut seen: HashSet<SpanKey> = HashSet::new();

        for hit in hits {
            let text = hit.entry.text.trim();
            if text.is_empty() || !seen.insert(span_key(&hit.entry, hit.corpus_index)) {
                continue;
            }
            blocks.push(truncate_chars(text, self.max_block_chars).to_string());
            contributing.push(&hit.entry);
        }

        let (source_urls, meta_lines) = describe_sources(contributing);

        EvidenceBundle {
            ordered_text_blocks: blocks,
            source_urls,
            meta_lines,
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Source URLs and meta lines for contributing entries, first URL wins.
fn describe_sources<'a, I>(entries: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = &'a TranscriptEntry>,
{
    let mut urls = Vec::new();
    let mut meta = Vec::new();
    let mut seen = HashSet::new();

    for entry in entries {
        let Some(url) = entry_url(entry) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let range = entry.time_range();
        meta.push(if range.is_empty() {
            format!("{} {}", entry.display_title(), url)
        } else {
            format!("{} [{}] {}", entry.display_title(), range, url)
        });
        urls.push(url);
    }

    (urls, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::entry;

    fn corpus(n: usize) -> IndexSnapshot {
        let entries = (0..n)
            .map(|i| entry("v", i, i as u64 * 30, &format!("chunk-{:02}", i)))
            .collect();
        IndexSnapshot::new(entries, vec![vec![1.0]; n]).unwrap()
    }

    fn hits(corpus: &IndexSnapshot, indices: &[usize]) -> Vec<SearchHit> {
        indices
            .iter()
            .enumerate()
            .map(|(rank, &i)| SearchHit {
                entry: corpus.entry(i).unwrap().clone(),
                score: 1.0 - rank as f32 * 0.1,
                rank_index: rank,
                corpus_index: i,
            })
            .collect()
    }

    fn block_indices(bundle: &EvidenceBundle) -> Vec<usize> {
        bundle
            .ordered_text_blocks
            .iter()
            .map(|b| b.trim_start_matches("chunk-").parse().unwrap())
            .collect()
    }

    fn windowed(window: usize) -> ContextAssembler {
        ContextAssembler::new()
            .with_window(window)
            .with_max_context_chars(10_000)
    }

    #[test]
    fn test_adjacent_hits_share_window() {
        let corpus = corpus(20);
        let bundle = windowed(1).assemble(&hits(&corpus, &[10, 11]), &corpus);
        assert_eq!(block_indices(&bundle), vec![9, 10, 11, 12]);
    }

    #[test]
    fn test_windows_follow_rank_order() {
        let corpus = corpus(20);
        let bundle = windowed(1).assemble(&hits(&corpus, &[11, 3]), &corpus);
        assert_eq!(block_indices(&bundle), vec![10, 11, 12, 2, 3, 4]);
        assert_eq!(
            bundle.source_urls,
            vec![
                "https://www.youtube.com/watch?v=v&t=330s",
                "https://www.youtube.com/watch?v=v&t=90s",
            ]
        );
    }

    #[test]
    fn test_window_clipped_to_corpus_bounds() {
        let corpus = corpus(20);
        let bundle = windowed(2).assemble(&hits(&corpus, &[0, 19]), &corpus);
        assert_eq!(block_indices(&bundle), vec![0, 1, 2, 17, 18, 19]);
    }

    #[test]
    fn test_every_window_stays_in_range_and_unique() {
        let corpus = corpus(20);
        for w in 0..4 {
            for indices in [vec![0, 1, 2], vec![5, 7, 6], vec![19, 18, 0, 10]] {
                let bundle = windowed(w).assemble(&hits(&corpus, &indices), &corpus);
                let got = block_indices(&bundle);
                let unique: HashSet<usize> = got.iter().copied().collect();
                assert_eq!(unique.len(), got.len());
                for idx in got {
                    assert!(indices
                        .iter()
                        .any(|&i| idx >= i.saturating_sub(w) && idx <= (i + w).min(19)));
                }
            }
        }
    }

    #[test]
    fn test_stops_at_character_cap() {
        let corpus = corpus(20);
        let assembler = ContextAssembler::new().with_window(2).with_max_context_chars(25);
        let bundle = assembler.assemble(&hits(&corpus, &[10, 15]), &corpus);
        // Each block is 8 chars: the cap is reached on the fourth.
        assert_eq!(block_indices(&bundle), vec![8, 9, 10, 11]);
        assert_eq!(bundle.source_urls.len(), 1);
    }

    #[test]
    fn test_duplicate_timestamps_collapse() {
        let entries = vec![
            entry("a", 0, 0, "first copy"),
            entry("a", 1, 0, "second copy"),
            entry("a", 2, 30, "later"),
            entry("b", 0, 0, "other video"),
        ];
        let corpus = IndexSnapshot::new(entries, vec![vec![1.0]; 4]).unwrap();

        let bundle = windowed(1).assemble(&hits(&corpus, &[1, 3]), &corpus);
        assert_eq!(
            bundle.ordered_text_blocks,
            vec!["first copy", "later", "other video"]
        );

        let flat = ContextAssembler::new()
            .with_mode(AssemblyMode::Flat)
            .assemble(&hits(&corpus, &[0, 1, 3]), &corpus);
        assert_eq!(flat.ordered_text_blocks, vec!["first copy", "other video"]);
    }

    #[test]
    fn test_missing_start_uses_corpus_index() {
        let mut entries = vec![entry("a", 0, 0, "one"), entry("a", 1, 0, "two")];
        entries.iter_mut().for_each(|e| e.start_sec = None);
        let corpus = IndexSnapshot::new(entries, vec![vec![1.0]; 2]).unwrap();

        let bundle = ContextAssembler::new()
            .with_mode(AssemblyMode::Flat)
            .assemble(&hits(&corpus, &[0, 1]), &corpus);
        assert_eq!(bundle.ordered_text_blocks, vec!["one", "two"]);
    }

    #[test]
    fn test_flat_mode_truncates_blocks() {
        let entries = vec![entry("a", 0, 0, "abcdefghij"), entry("a", 1, 30, "klm")];
        let corpus = IndexSnapshot::new(entries, vec![vec![1.0]; 2]).unwrap();

        let bundle = ContextAssembler::new()
            .with_mode(AssemblyMode::Flat)
            .with_max_block_chars(4)
            .assemble(&hits(&corpus, &[1, 0]), &corpus);
        assert_eq!(bundle.ordered_text_blocks, vec!["klm", "abcd"]);
        assert_eq!(bundle.meta_lines.len(), 2);
        assert!(bundle.meta_lines[0].starts_with("Lecture a [00:30–01:00] https://"));
    }

    #[test]
    fn test_no_hits_is_empty() {
        let corpus = corpus(3);
        assert!(windowed(2).assemble(&[], &corpus).is_empty());
    }
}
