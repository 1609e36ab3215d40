//! Read-only nearest-neighbour search over indexed transcript chunks.
//!
//! Scores are cosine similarities: **higher is more relevant**, and hits are
//! always returned best-first. Everything downstream (context assembly,
//! source ordering) relies on that ordering.

mod snapshot;

pub use snapshot::{IndexSnapshot, CHUNKS_FILE, VECTORS_FILE};

use crate::embedding::Embedder;
use crate::error::{Result, SunnoError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// A bounded span of lecture transcript with its time and source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTranscriptEntry")]
pub struct TranscriptEntry {
    /// Chunk identifier, unique within its video.
    pub chunk_id: String,
    /// Stable video identifier.
    pub video_id: String,
    /// Video title.
    #[serde(default)]
    pub title: Option<String>,
    /// Transcript text of this chunk.
    pub text: String,
    /// Start offset in whole seconds.
    #[serde(default)]
    pub start_sec: Option<u64>,
    /// End offset in whole seconds.
    #[serde(default)]
    pub end_sec: Option<u64>,
    /// Start offset as `HH:MM:SS`.
    #[serde(default)]
    pub start_hhmmss: Option<String>,
    /// End offset as `HH:MM:SS`.
    #[serde(default)]
    pub end_hhmmss: Option<String>,
    /// Playback URL recorded at chunking time.
    #[serde(default)]
    pub play_url: Option<String>,
}

impl TranscriptEntry {
    /// Title for display, with a fallback for untitled videos.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled lecture")
    }

    /// Human-readable time range such as `00:12:03–00:14:10`.
    pub fn time_range(&self) -> String {
        let start = self
            .start_hhmmss
            .clone()
            .or_else(|| self.start_sec.map(format_timestamp))
            .unwrap_or_default();
        let end = self
            .end_hhmmss
            .clone()
            .or_else(|| self.end_sec.map(format_timestamp))
            .unwrap_or_default();

        match (start.is_empty(), end.is_empty()) {
            (false, false) => format!("{}–{}", start, end),
            (false, true) => start,
            (true, false) => end,
            (true, true) => String::new(),
        }
    }
}

/// Chunk record as found on disk: the text may live under `text`,
/// `text_roman`, or both.
#[derive(Deserialize)]
struct RawTranscriptEntry {
    chunk_id: String,
    video_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    text_roman: Option<String>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    start_sec: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    end_sec: Option<u64>,
    #[serde(default)]
    start_hhmmss: Option<String>,
    #[serde(default)]
    end_hhmmss: Option<String>,
    #[serde(default)]
    play_url: Option<String>,
}

impl TryFrom<RawTranscriptEntry> for TranscriptEntry {
    type Error = String;

    fn try_from(raw: RawTranscriptEntry) -> std::result::Result<Self, Self::Error> {
        let text = match (raw.text, raw.text_roman) {
            (Some(text), _) if !text.trim().is_empty() => text,
            (_, Some(roman)) => roman,
            (Some(text), None) => text,
            (None, None) => {
                return Err(format!("chunk {} has neither text nor text_roman", raw.chunk_id))
            }
        };

        Ok(Self {
            chunk_id: raw.chunk_id,
            video_id: raw.video_id,
            title: raw.title,
            text,
            start_sec: raw.start_sec,
            end_sec: raw.end_sec,
            start_hhmmss: raw.start_hhmmss,
            end_hhmmss: raw.end_hhmmss,
            play_url: raw.play_url,
        })
    }
}

/// Accept integer or fractional seconds; fractional values are floored.
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.floor() as u64))
}

/// Read transcript entries from a JSON array or a JSON Lines file.
pub fn read_entries(path: &Path) -> Result<Vec<TranscriptEntry>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(SunnoError::from))
        .collect()
}

/// Format seconds for display.
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// A single retrieval result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched entry.
    pub entry: TranscriptEntry,
    /// Cosine similarity (higher is better).
    pub score: f32,
    /// Position in the result list, 0 for the best hit.
    pub rank_index: usize,
    /// Position of the entry in the index snapshot.
    pub corpus_index: usize,
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Evidence index: an embedder paired with an immutable snapshot.
///
/// The snapshot is shared behind an `Arc`, so concurrent queries never block
/// each other. A request takes one snapshot handle up front and uses it for
/// both search and context assembly; a concurrent [`EvidenceIndex::reload`]
/// only affects later requests.
pub struct EvidenceIndex {
    embedder: Arc<dyn Embedder>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    query_prefix: String,
}

impl EvidenceIndex {
    /// Wrap a loaded snapshot. Fails if the embedder dimensionality differs.
    pub fn new(snapshot: IndexSnapshot, embedder: Arc<dyn Embedder>) -> Result<Self> {
        check_dimensions(&snapshot, embedder.as_ref())?;
        Ok(Self {
            embedder,
            snapshot: RwLock::new(Some(Arc::new(snapshot))),
            query_prefix: String::new(),
        })
    }

    /// An index with no snapshot. Every search returns no hits.
    pub fn unavailable(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            snapshot: RwLock::new(None),
            query_prefix: String::new(),
        }
    }

    /// Load index artifacts from a directory.
    pub fn load(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let snapshot = IndexSnapshot::load(dir)?;
        let index = Self::new(snapshot, embedder)?;
        info!("Loaded evidence index with {} entries from {:?}", index.len(), dir);
        Ok(index)
    }

    /// Load index artifacts, degrading to an unavailable index on failure.
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Self {
        match Self::load(dir, embedder.clone()) {
            Ok(index) => index,
            Err(e) => {
                error!("Evidence index unavailable: {}", e);
                Self::unavailable(embedder)
            }
        }
    }

    /// Embed entries and build a fresh index.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn build(entries: Vec<TranscriptEntry>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if entries.is_empty() {
            return Err(SunnoError::InvalidInput("No transcript entries to index".to_string()));
        }

        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        let snapshot = IndexSnapshot::new(entries, vectors)?;
        Self::new(snapshot, embedder)
    }

    /// Prepend a fixed prefix to every query before embedding.
    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = prefix.into();
        self
    }

    /// Current snapshot, if the index is available.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether a snapshot is loaded.
    pub fn is_available(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Number of indexed entries (0 when unavailable).
    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a freshly loaded snapshot from a directory.
    pub fn reload(&self, dir: &Path) -> Result<()> {
        let snapshot = IndexSnapshot::load(dir)?;
        check_dimensions(&snapshot, self.embedder.as_ref())?;
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::new(snapshot));
        info!("Reloaded evidence index from {:?}", dir);
        Ok(())
    }

    /// Write the current snapshot to a directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let snapshot = self
            .snapshot()
            .ok_or_else(|| SunnoError::Index("No snapshot loaded to save".to_string()))?;
        snapshot.save(dir)?;
        info!("Saved evidence index with {} entries to {:?}", snapshot.len(), dir);
        Ok(())
    }

    /// Search the current snapshot for the `top_k` best entries.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        match self.snapshot() {
            Some(snapshot) => self.search_snapshot(&snapshot, query, top_k).await,
            None => {
                error!("Evidence index is not loaded; returning no hits");
                Vec::new()
            }
        }
    }

    /// Search a specific snapshot. Embedding failures yield no hits.
    #[instrument(skip(self, snapshot, query))]
    pub async fn search_snapshot(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        top_k: usize,
    ) -> Vec<SearchHit> {
        if top_k == 0 || snapshot.is_empty() {
            return Vec::new();
        }

        let query_text = format!("{}{}", self.query_prefix, query);
        let embedding = match self.embedder.embed(&query_text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Query embedding failed, treating as zero hits: {}", e);
                return Vec::new();
            }
        };

        if embedding.len() != snapshot.dimensions() {
            error!(
                "Query embedding has {} dimensions, index expects {}",
                embedding.len(),
                snapshot.dimensions()
            );
            return Vec::new();
        }

        let hits = snapshot.search(&embedding, top_k);
        debug!("Retrieved {} hits", hits.len());
        hits
    }
}

fn check_dimensions(snapshot: &IndexSnapshot, embedder: &dyn Embedder) -> Result<()> {
    if snapshot.dimensions() != embedder.dimensions() {
        return Err(SunnoError::Config(format!(
            "Index was built with {}-dimensional embeddings but the embedder produces {}",
            snapshot.dimensions(),
            embedder.dimensions()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embedding::testing::KeywordEmbedder;

    pub(crate) const VOCAB: &[&str] = &["iman", "namaz", "quran", "roza"];

    pub(crate) fn entry(video_id: &str, idx: usize, start: u64, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            chunk_id: format!("{}_{:04}", video_id, idx),
            video_id: video_id.to_string(),
            title: Some(format!("Lecture {}", video_id)),
            text: text.to_string(),
            start_sec: Some(start),
            end_sec: Some(start + 30),
            start_hhmmss: None,
            end_hhmmss: None,
            play_url: None,
        }
    }

    pub(crate) async fn sample_index() -> EvidenceIndex {
        let entries = vec![
            entry("v1", 0, 0, "Iman is the foundation of faith."),
            entry("v1", 1, 30, "Namaz is prayed five times a day."),
            entry("v2", 0, 0, "The Quran was revealed over 23 years."),
            entry("v2", 1, 30, "Roza is fasting in Ramadan, iman grows with it."),
        ];
        EvidenceIndex::build(entries, Arc::new(KeywordEmbedder::new(VOCAB)))
            .await
            .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(125), "02:05");
        assert_eq!(format_timestamp(3725), "01:02:05");
    }

    #[test]
    fn test_entry_accepts_text_roman_alias() {
        let json = r#"{
            "chunk_id": "abc123_0001",
            "video_id": "abc123",
            "title": null,
            "text_roman": "iman ki tareef",
            "start_sec": 125.7,
            "end_sec": 180,
            "start_hhmmss": "00:02:05",
            "end_hhmmss": "00:03:00",
            "play_url": "https://www.youtube.com/watch?v=abc123&t=120s",
            "playlist_id": "PL1"
        }"#;
        let entry: TranscriptEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.text, "iman ki tareef");
        assert_eq!(entry.start_sec, Some(125));
        assert_eq!(entry.end_sec, Some(180));
        assert_eq!(entry.display_title(), "Untitled lecture");
        assert_eq!(entry.time_range(), "00:02:05–00:03:00");
    }

    #[test]
    fn test_entry_text_field_shapes() {
        let text_only: TranscriptEntry =
            serde_json::from_str(r#"{"chunk_id":"a_0","video_id":"a","text":"ایمان"}"#).unwrap();
        assert_eq!(text_only.text, "ایمان");

        let roman_only: TranscriptEntry =
            serde_json::from_str(r#"{"chunk_id":"a_0","video_id":"a","text_roman":"iman"}"#)
                .unwrap();
        assert_eq!(roman_only.text, "iman");

        let both: TranscriptEntry = serde_json::from_str(
            r#"{"chunk_id":"a_0","video_id":"a","text":"ایمان","text_roman":"iman","start_sec":0}"#,
        )
        .unwrap();
        assert_eq!(both.text, "ایمان");
        assert_eq!(both.start_sec, Some(0));

        let blank_text: TranscriptEntry = serde_json::from_str(
            r#"{"chunk_id":"a_0","video_id":"a","text":"  ","text_roman":"iman"}"#,
        )
        .unwrap();
        assert_eq!(blank_text.text, "iman");

        let neither = serde_json::from_str::<TranscriptEntry>(r#"{"chunk_id":"a_0","video_id":"a"}"#);
        assert!(neither.is_err());
    }

    #[tokio::test]
    async fn test_search_orders_best_first() {
        let index = sample_index().await;
        let hits = index.search("what is namaz", 4).await;

        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].entry.chunk_id, "v1_0001");
        assert_eq!(hits[0].rank_index, 0);
        assert_eq!(hits[0].corpus_index, 1);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            assert_eq!(pair[1].rank_index, pair[0].rank_index + 1);
        }
    }

    #[tokio::test]
    async fn test_top_k_larger_than_corpus() {
        let index = sample_index().await;
        let hits = index.search("quran", 50).await;
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].entry.video_id, "v2");
    }

    #[tokio::test]
    async fn test_unavailable_index_returns_nothing() {
        let index = EvidenceIndex::unavailable(Arc::new(KeywordEmbedder::new(VOCAB)));
        assert!(!index.is_available());
        assert!(index.search("iman", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_zero_hits() {
        let good = sample_index().await;
        let snapshot = good.snapshot().unwrap();
        let broken = EvidenceIndex::unavailable(Arc::new(KeywordEmbedder::failing(VOCAB)));
        assert!(broken.search_snapshot(&snapshot, "iman", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_load_error() {
        let index = sample_index().await;
        let dir = tempfile::tempdir().unwrap();
        index.snapshot().unwrap().save(dir.path()).unwrap();

        let other = Arc::new(KeywordEmbedder::new(&["iman"]));
        let err = EvidenceIndex::load(dir.path(), other.clone()).err().unwrap();
        assert!(matches!(err, SunnoError::Config(_)));

        let degraded = EvidenceIndex::open(dir.path(), other);
        assert!(!degraded.is_available());
    }

    #[tokio::test]
    async fn test_save_load_round_trip_preserves_hits() {
        let index = sample_index().await;
        let before = index.search("iman and roza", 4).await;

        let dir = tempfile::tempdir().unwrap();
        index.save(dir.path()).unwrap();

        let reloaded =
            EvidenceIndex::load(dir.path(), Arc::new(KeywordEmbedder::new(VOCAB))).unwrap();
        let after = reloaded.search("iman and roza", 4).await;

        let ids = |hits: &[SearchHit]| {
            hits.iter()
                .map(|h| (h.entry.chunk_id.clone(), h.corpus_index))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&before), ids(&after));
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let index = EvidenceIndex::unavailable(Arc::new(KeywordEmbedder::new(VOCAB)));
        let built = sample_index().await;
        let dir = tempfile::tempdir().unwrap();
        built.snapshot().unwrap().save(dir.path()).unwrap();

        index.reload(dir.path()).unwrap();
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_read_entries_array_and_lines() {
        let dir = tempfile::tempdir().unwrap();

        let array = dir.path().join("chunks.json");
        std::fs::write(
            &array,
            r#"[{"chunk_id": "a_0", "video_id": "a", "text": "first"},
                {"chunk_id": "a_1", "video_id": "a", "text_roman": "second", "start_sec": 30.7}]"#,
        )
        .unwrap();
        let entries = read_entries(&array).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].text, "second");
        assert_eq!(entries[1].start_sec, Some(30));

        let lines = dir.path().join("chunks.jsonl");
        std::fs::write(
            &lines,
            "{\"chunk_id\": \"b_0\", \"video_id\": \"b\", \"text\": \"one\"}\n\n{\"chunk_id\": \"b_1\", \"video_id\": \"b\", \"text\": \"two\"}\n",
        )
        .unwrap();
        assert_eq!(read_entries(&lines).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_unavailable_index_fails() {
        let index = EvidenceIndex::unavailable(Arc::new(KeywordEmbedder::new(VOCAB)));
        let dir = tempfile::tempdir().unwrap();
        assert!(index.save(dir.path()).is_err());
    }
}
