//! CLI module for Sunno.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Sunno - ask questions about lecture videos
///
/// Answers questions in Urdu, Hindi, Roman Urdu, or English from indexed
/// lecture transcripts, with links to the exact moments in the videos.
/// The name "Sunno" is Urdu/Hindi for "listen."
#[derive(Parser, Debug)]
#[command(name = "sunno")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question and get an answer with video sources
    Ask {
        /// The question to ask
        question: String,

        /// Number of transcript hits to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search for relevant transcript segments
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Embed transcript chunks and write the evidence index
    Index {
        /// Chunk file (JSON array or JSON Lines of transcript entries)
        chunks: String,

        /// Output directory (defaults to the configured index directory)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}
