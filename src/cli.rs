// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// semstore - Semantic document store
///
/// Chunks and embeds business analyses, risk profiles and legal documents
/// into a JSON snapshot, then ranks them by cosine similarity.
#[derive(Parser, Debug)]
#[command(name = "semstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Snapshot file (overrides config and SEMSTORE_PATH)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a business description with its analysis
    AddBusiness {
        /// Business description (chunked and embedded)
        description: String,

        /// Analysis payload as JSON, attached to every chunk
        #[arg(long, default_value = "{}")]
        analysis: String,
    },

    /// Store a risk profile under its domain/geography anchor
    AddRisk {
        /// Business domain (e.g. fintech)
        domain: String,

        /// Geography (e.g. US)
        geography: String,

        /// Profile payload as JSON
        #[arg(long, default_value = "{}")]
        profile: String,
    },

    /// Store a legal document
    AddLegal {
        /// Document text (or use --file)
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        content: Option<String>,

        /// Read document text from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Jurisdiction (e.g. EU, US)
        #[arg(short, long)]
        jurisdiction: Option<String>,

        /// Extra metadata field (KEY=VALUE, repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Add every .txt file in a directory as a legal document
    Ingest {
        /// Directory holding the documents
        #[arg(default_value = "legal_docs")]
        dir: PathBuf,

        /// Jurisdiction attached to every document
        #[arg(short, long)]
        jurisdiction: Option<String>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// File extension to pick up
        #[arg(long, default_value = "txt")]
        extension: String,
    },

    /// Rank stored records against a query
    Search {
        /// Query text
        query: String,

        /// Maximum number of hits (default from config, else 3)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Rank, then keep legal documents (optionally one jurisdiction)
    SearchLegal {
        /// Query text
        query: String,

        /// Exact jurisdiction to keep
        #[arg(short, long)]
        jurisdiction: Option<String>,

        /// Candidates ranked before filtering (default from config, else 5)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Return a cached business analysis if one is similar enough
    FindBusiness {
        /// Business description
        description: String,

        /// Minimum similarity (default from config, else 0.8)
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Return a cached risk profile for a domain and geography
    FindRisk {
        /// Business domain
        domain: String,

        /// Geography
        geography: String,

        /// Minimum similarity (default from config, else 0.8)
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Show record counts by type
    Stats,

    /// Show the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
