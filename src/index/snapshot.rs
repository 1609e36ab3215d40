//! Immutable index snapshot and its on-disk artifacts.
//!
//! A snapshot is persisted as two files in one directory:
//! `vectors.bin` (header + little-endian `f32` rows) and `chunks.json`
//! (the parallel, ordered metadata records). Both must load together and
//! agree on cardinality.

use super::{cosine_similarity, SearchHit, TranscriptEntry};
use crate::error::{Result, SunnoError};
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument};

/// Binary vector artifact file name.
pub const VECTORS_FILE: &str = "vectors.bin";
/// Metadata artifact file name.
pub const CHUNKS_FILE: &str = "chunks.json";

const MAGIC: &[u8; 4] = b"SNVX";
const FORMAT_VERSION: u32 = 1;
/// magic + version + dimensions + count
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Entries and their embeddings, row-aligned.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    dimensions: usize,
    /// Row-major, `entries.len() * dimensions` values.
    vectors: Vec<f32>,
    entries: Vec<TranscriptEntry>,
}

impl IndexSnapshot {
    /// Build a snapshot from entries and their embeddings.
    pub fn new(entries: Vec<TranscriptEntry>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if entries.len() != embeddings.len() {
            return Err(SunnoError::Index(format!(
                "{} entries but {} embeddings",
                entries.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings.first().map(|v| v.len()).unwrap_or(0);
        if !entries.is_empty() && dimensions == 0 {
            return Err(SunnoError::Index("Embeddings are empty".to_string()));
        }

        let mut vectors = Vec::with_capacity(entries.len() * dimensions);
        for (i, embedding) in embeddings.into_iter().enumerate() {
            if embedding.len() != dimensions {
                return Err(SunnoError::Index(format!(
                    "Embedding {} has {} dimensions, expected {}",
                    i,
                    embedding.len(),
                    dimensions
                )));
            }
            vectors.extend(embedding);
        }

        Ok(Self {
            dimensions,
            vectors,
            entries,
        })
    }

    /// Embedding dimensionality.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in corpus order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entry at a corpus index.
    pub fn entry(&self, index: usize) -> Option<&TranscriptEntry> {
        self.entries.get(index)
    }

    fn row(&self, index: usize) -> &[f32] {
        &self.vectors[index * self.dimensions..(index + 1) * self.dimensions]
    }

    /// Exhaustive cosine search. Ties keep corpus order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = (0..self.entries.len())
            .map(|i| (i, cosine_similarity(query, self.row(i))))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(rank_index, (corpus_index, score))| SearchHit {
                entry: self.entries[corpus_index].clone(),
                score,
                rank_index,
                corpus_index,
            })
            .collect()
    }

    /// Write both artifacts into `dir`, replacing any previous ones.
    #[instrument(skip(self))]
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        bytes.extend(self.vectors.iter().flat_map(|f| f.to_le_bytes()));

        write_atomic(&dir.join(VECTORS_FILE), &bytes)?;
        write_atomic(
            &dir.join(CHUNKS_FILE),
            &serde_json::to_vec_pretty(&self.entries)?,
        )?;

        debug!("Saved {} entries to {:?}", self.entries.len(), dir);
        Ok(())
    }

    /// Read both artifacts from `dir`.
    #[instrument]
    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        for path in [&vectors_path, &chunks_path] {
            if !path.exists() {
                return Err(SunnoError::Index(format!(
                    "Index artifact not found: {}",
                    path.display()
                )));
            }
        }

        let bytes = std::fs::read(&vectors_path)?;
        let (dimensions, count) = parse_header(&bytes)?;

        let expected = count
            .checked_mul(dimensions)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                SunnoError::Index(format!(
                    "{} header declares {} rows of {} dimensions",
                    vectors_path.display(),
                    count,
                    dimensions
                ))
            })?;
        if bytes.len() != expected {
            return Err(SunnoError::Index(format!(
                "{} is {} bytes, expected {}",
                vectors_path.display(),
                bytes.len(),
                expected
            )));
        }

        let vectors: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let entries: Vec<TranscriptEntry> =
            serde_json::from_slice(&std::fs::read(&chunks_path)?)?;

        if entries.len() != count {
            return Err(SunnoError::Index(format!(
                "Vector artifact holds {} rows but metadata holds {} entries",
                count,
                entries.len()
            )));
        }

        Ok(Self {
            dimensions,
            vectors,
            entries,
        })
    }
}

fn parse_header(bytes: &[u8]) -> Result<(usize, usize)> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(SunnoError::Index("Not a vector index artifact".to_string()));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(SunnoError::Index(format!(
            "Unsupported index format version {}",
            version
        )));
    }

    let dimensions = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count);

    let dimensions = usize::try_from(dimensions)
        .map_err(|_| SunnoError::Index(format!("Dimension count {} is too large", dimensions)))?;
    let count = usize::try_from(count)
        .map_err(|_| SunnoError::Index(format!("Row count {} is too large", count)))?;

    Ok((dimensions, count))
}

/// Write through a temp file in the same directory, then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| SunnoError::Io(e.error))?;
    Ok(())
}
