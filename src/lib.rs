//! Sunno - multilingual question answering over lecture transcripts
//!
//! Answers questions in Urdu, Hindi, Roman Urdu, or English from an index of
//! timestamped lecture transcript chunks, and links every answer back to the
//! video moments that support it.
//!
//! The name "Sunno" is Urdu/Hindi for "listen."
//!
//! # Architecture
//!
//! - `language` - Query language identification
//! - `index` - Evidence index: chunk metadata, vectors, nearest-neighbour search
//! - `embedding` - Embedding generation
//! - `rag` - Context assembly, prompt budgeting, generation, extraction, sources
//! - `orchestrator` - The per-request answer pipeline
//! - `config` - Settings and per-language prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use sunno::config::Settings;
//! use sunno::orchestrator::{AskRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let response = orchestrator.answer(&AskRequest::new("iman kya hai?")).await;
//!     println!("{}", response.answer);
//!     for url in &response.sources {
//!         println!("{}", url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod language;
pub mod openai;
pub mod orchestrator;
pub mod rag;

pub use error::{Result, SunnoError};
