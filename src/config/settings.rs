//! Configuration settings for Sunno.

use crate::rag::generator::{Decoding, GenerationOptions};
use crate::rag::AssemblyMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub answer: AnswerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.sunno".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use. Must match the model the index was built with.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Prefix prepended to queries before embedding (e.g. "query: ").
    pub query_prefix: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            query_prefix: String::new(),
        }
    }
}

/// Evidence index location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding `vectors.bin` and `chunks.json`.
    pub dir: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: "~/.sunno/index".to_string(),
        }
    }
}

/// Retrieval and context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Default number of hits per question.
    pub top_k: usize,
    /// Context assembly mode.
    pub mode: AssemblyMode,
    /// Neighbours included on each side of a hit in windowed mode.
    pub window: usize,
    /// Character cap on the assembled context in windowed mode.
    pub max_context_chars: usize,
    /// Per-block character cap in flat mode.
    pub max_block_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            mode: AssemblyMode::Windowed,
            window: 2,
            max_context_chars: 900,
            max_block_chars: 1500,
        }
    }
}

/// Generation backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// OpenAI chat completions.
    #[default]
    OpenAI,
    /// A text-generation-inference compatible HTTP server.
    Tgi,
    /// No model; answers are always extracted from context.
    Extractive,
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(GenerationProvider::OpenAI),
            "tgi" | "http" => Ok(GenerationProvider::Tgi),
            "extractive" | "none" => Ok(GenerationProvider::Extractive),
            _ => Err(format!("Unknown generation provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::OpenAI => write!(f, "openai"),
            GenerationProvider::Tgi => write!(f, "tgi"),
            GenerationProvider::Extractive => write!(f, "extractive"),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation backend.
    pub provider: GenerationProvider,
    /// Model name (openai provider).
    pub model: String,
    /// Base URL of the generation server (tgi provider).
    pub endpoint: String,
    /// Model input window in tokens.
    pub max_context_tokens: usize,
    /// Tokens reserved for the generated answer.
    pub max_new_tokens: usize,
    /// Extra tokens held back from the prompt budget.
    pub safety_margin: usize,
    /// Character cap applied to each meta line or evidence block.
    pub max_block_chars: usize,
    /// Maximum meta lines offered to the trimmer.
    pub max_meta_lines: usize,
    /// Maximum evidence blocks offered to the trimmer.
    pub max_evidence_blocks: usize,
    /// Greedy decoding when true, sampling otherwise.
    pub greedy: bool,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling probability.
    pub top_p: f32,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f32,
    /// Characters per token for the heuristic tokenizer.
    pub chars_per_token: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            endpoint: "http://127.0.0.1:8080".to_string(),
            max_context_tokens: 1024,
            max_new_tokens: 200,
            safety_margin: 32,
            max_block_chars: 1500,
            max_meta_lines: 30,
            max_evidence_blocks: 30,
            greedy: true,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.1,
            chars_per_token: 4,
        }
    }
}

impl GenerationSettings {
    /// Per-call options for the configured decoding strategy.
    pub fn options(&self) -> GenerationOptions {
        let decoding = if self.greedy {
            Decoding::Greedy
        } else {
            Decoding::Sampling {
                temperature: self.temperature,
                top_p: self.top_p,
            }
        };
        GenerationOptions {
            max_new_tokens: self.max_new_tokens,
            decoding,
            repetition_penalty: (self.repetition_penalty > 1.0).then_some(self.repetition_penalty),
        }
    }
}

/// Final answer presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Maximum number of source links returned.
    pub max_sources: usize,
    /// Overall time limit for one question.
    pub request_timeout_secs: u64,
    /// Append the localized sources block to the answer text.
    pub append_sources: bool,
    /// Add the leading emoji and bold first sentence.
    pub decorate: bool,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            max_sources: 5,
            request_timeout_secs: 120,
            append_sources: true,
            decorate: true,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory containing a custom `prompts.toml`.
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SunnoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sunno")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded index directory path.
    pub fn index_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            mode = "flat"
            window = 1

            [generation]
            provider = "extractive"
            "#,
        )
        .unwrap();

        assert_eq!(settings.retrieval.mode, AssemblyMode::Flat);
        assert_eq!(settings.retrieval.window, 1);
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.generation.provider, GenerationProvider::Extractive);
        assert_eq!(settings.generation.max_context_tokens, 1024);
        assert_eq!(settings.answer.max_sources, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.generation.model = "gpt-4.1-mini".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.generation.model, "gpt-4.1-mini");
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("TGI".parse::<GenerationProvider>().unwrap(), GenerationProvider::Tgi);
        assert!("bogus".parse::<GenerationProvider>().is_err());
    }
}
