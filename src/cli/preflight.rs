//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and index artifacts are in place before
//! starting operations that would otherwise fail midway or degrade silently.

use crate::config::{GenerationProvider, Settings};
use crate::error::{Result, SunnoError};
use crate::index::{CHUNKS_FILE, VECTORS_FILE};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Building an index embeds every chunk.
    Index,
    /// Asking needs the index and, for the OpenAI backend, an API key.
    Ask,
    /// Search needs the index and query embeddings.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    // Queries and chunks are always embedded through OpenAI.
    check_api_key()?;

    match operation {
        Operation::Index => {}
        Operation::Ask => {
            check_index(settings)?;
            if settings.generation.provider == GenerationProvider::Tgi
                && settings.generation.endpoint.trim().is_empty()
            {
                return Err(SunnoError::Config(
                    "generation.endpoint must be set for the tgi provider".to_string(),
                ));
            }
        }
        Operation::Search => check_index(settings)?,
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SunnoError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SunnoError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check that both index artifacts exist.
fn check_index(settings: &Settings) -> Result<()> {
    let dir = settings.index_dir();
    for file in [VECTORS_FILE, CHUNKS_FILE] {
        if !dir.join(file).exists() {
            return Err(SunnoError::Index(format!(
                "{} not found in {}. Build it with: sunno index <chunks.json>",
                file,
                dir.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.index.dir = dir.path().to_string_lossy().to_string();

        let err = check_index(&settings).unwrap_err();
        assert!(err.to_string().contains(VECTORS_FILE));

        std::fs::write(dir.path().join(VECTORS_FILE), b"").unwrap();
        std::fs::write(dir.path().join(CHUNKS_FILE), b"[]").unwrap();
        assert!(check_index(&settings).is_ok());
    }
}
