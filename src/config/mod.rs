//! Configuration module for Sunno.
//!
//! Handles loading and managing application settings and the per-language
//! template table.

mod prompts;
mod settings;

pub use prompts::{LanguageTemplate, Prompts};
pub use settings::{
    AnswerSettings, EmbeddingSettings, GeneralSettings, GenerationProvider, GenerationSettings,
    IndexSettings, PromptSettings, RetrievalSettings, Settings,
};
