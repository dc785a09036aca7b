//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "filterer",
    version,
    author = "neur0map",
    about = "Filter extraction merge engine and batched reranker",
    long_about = "Filterer normalizes filters extracted from natural-language queries, merges them \
                  into caller-supplied filters without overriding explicit choices, and reranks \
                  candidate businesses in fixed-size scoring chunks."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/filterer/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// JSON inputs accept a file path or `-` for stdin
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fill empty or missing filters from extracted ones
    Merge {
        /// Caller filters (JSON object)
        existing: PathBuf,

        /// Extracted filters (JSON object)
        extracted: PathBuf,

        /// Mapping from extracted to storage names (defaults to the configured mapping)
        #[arg(short, long, value_name = "FILE")]
        mapping: Option<PathBuf>,
    },

    /// Normalize raw extraction output into typed, renamed filters
    Process {
        /// Raw extraction output (JSON object)
        extracted: PathBuf,

        /// Additional mapping, applied over the default and score mappings
        #[arg(short, long, value_name = "FILE")]
        mapping: Option<PathBuf>,
    },

    /// Drop filters whose value is empty
    Clean {
        /// Filters (JSON object)
        filters: PathBuf,
    },

    /// List keys whose filter value is empty
    EmptyKeys {
        /// Filters (JSON object)
        filters: PathBuf,
    },

    /// Show the storage names generated for `*_score` keys
    ScoreMapping {
        /// Raw extraction output (JSON object)
        extracted: PathBuf,
    },

    /// Rerank candidates using a precomputed score table
    Rerank {
        /// Query the candidates are scored against
        query: String,

        /// Candidate businesses (JSON array)
        #[arg(long, value_name = "FILE")]
        candidates: PathBuf,

        /// Score table: `{"business_scores": [...]}` or a bare array
        #[arg(long, value_name = "FILE")]
        scores: PathBuf,

        /// Override the configured chunk size
        #[arg(long)]
        chunk_size: Option<usize>,
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
    Show {
        /// Show only a specific section (filters, rerank, pipeline)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the default configuration path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
