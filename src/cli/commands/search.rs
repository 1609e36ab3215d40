//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::index::EvidenceIndex;
use crate::rag::sources::entry_url;
use anyhow::Result;
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let embedder = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    )?);
    let index = EvidenceIndex::load(&settings.index_dir(), embedder)?
        .with_query_prefix(settings.embedding.query_prefix.clone());

    let spinner = Output::spinner("Searching...");
    let hits = index.search(query, limit).await;
    spinner.finish_and_clear();

    if hits.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", hits.len()));
    for hit in &hits {
        Output::search_hit(
            hit.entry.display_title(),
            &hit.entry.time_range(),
            hit.score,
            &hit.entry.text,
            entry_url(&hit.entry).as_deref(),
        );
    }

    Ok(())
}
