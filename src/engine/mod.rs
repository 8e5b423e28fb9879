//! Engine: CLI, storage backends, and run plumbing around the export pipeline.

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod progress;
pub mod tools;

pub use arg_parser::Cli;
pub use cli::handle_run;
pub use db_ops::{
    DOCUMENTS_SCHEMA, RANKING_SCHEMA, SqliteDocumentStore, SqliteRankingStore, open_db,
    open_db_in_memory,
};
pub use tools::{install_cancellation, path_to_db_string};
