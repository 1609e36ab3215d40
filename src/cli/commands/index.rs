//! Index command: embed transcript chunks and write the index artifacts.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::index::{read_entries, EvidenceIndex};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Run the index command.
pub async fn run_index(chunks: &str, output: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let chunks_path = Settings::expand_path(chunks);
    let entries = read_entries(&chunks_path)
        .with_context(|| format!("Failed to read chunks from {}", chunks_path.display()))?;
    Output::info(&format!("Loaded {} transcript chunks", entries.len()));

    let embedder = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    )?);

    let spinner = Output::spinner(&format!("Embedding with {}...", settings.embedding.model));
    let index = EvidenceIndex::build(entries, embedder).await;
    spinner.finish_and_clear();
    let index = index?;

    let dir = match output {
        Some(path) => Settings::expand_path(&path),
        None => settings.index_dir(),
    };
    save(&index, &dir)?;

    Output::success(&format!("Indexed {} chunks into {}", index.len(), dir.display()));
    Ok(())
}

fn save(index: &EvidenceIndex, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    index
        .save(dir)
        .with_context(|| format!("Failed to write index to {}", dir.display()))
}
