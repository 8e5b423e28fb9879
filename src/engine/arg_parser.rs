use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Export per-upload symbol data into the ranking graph tables.
#[derive(Clone, Parser)]
#[command(name = "rankgraph")]
#[command(about = "Export the next batch of uploads into the ranking graph; use --vacuum to drop stale rows.")]
pub struct Cli {
    /// Working directory: holds the databases, `.rankgraph.toml` and `.env` by default.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Ranking store database. Default: `rankgraph.db` in DIR.
    #[arg(long, short = 's')]
    pub store: Option<PathBuf>,

    /// Document store database. Default: `rankgraph-documents.db` in DIR.
    #[arg(long, short = 'd')]
    pub documents: Option<PathBuf>,

    /// Graph key tagging every row written by this run.
    #[arg(long, short = 'k')]
    pub graph_key: Option<String>,

    /// Uploads per run and documents per page.
    #[arg(long, short = 'r', value_parser = clap::value_parser!(usize))]
    pub read_batch_size: Option<usize>,

    /// Rows per insert batch.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub write_batch_size: Option<usize>,

    /// Capacity of each record queue.
    #[arg(long, short = 'q', value_parser = clap::value_parser!(usize))]
    pub queue_capacity: Option<usize>,

    /// Symbols with this prefix are never exported. Pass "" to export everything.
    #[arg(long)]
    pub skip_prefix: Option<String>,

    /// Enable the export. `--enabled false` turns the run into a no-op.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub enabled: Option<bool>,

    /// Open both databases with SQLCipher. Prompts for passphrase (or use RANKGRAPH_DB_KEY / .env).
    #[arg(long, short = 'x', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub encrypt: Option<bool>,

    /// Abort after this many seconds. 0 = no deadline.
    #[arg(long, short = 't', value_parser = clap::value_parser!(u64))]
    pub timeout: Option<u64>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// After exporting, delete rows of stale uploads for the graph key.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub vacuum: Option<bool>,
}

impl Cli {
    /// Ranking store path, defaulting to the package db filename in DIR.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| self.dir.join(PackagePaths::get().store_filename()))
    }

    /// Document store path, defaulting to the package documents filename in DIR.
    pub fn documents_path(&self) -> PathBuf {
        self.documents
            .clone()
            .unwrap_or_else(|| self.dir.join(PackagePaths::get().documents_filename()))
    }
}
