//! Error types for Sunno.

use thiserror::Error;

/// Library-level error type for Sunno operations.
#[derive(Error, Debug)]
pub enum SunnoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Evidence index error: {0}")]
    Index(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Sunno operations.
pub type Result<T> = std::result::Result<T, SunnoError>;
