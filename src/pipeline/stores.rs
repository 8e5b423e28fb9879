//! Storage collaborators used by the export pipeline.
//!
//! The SQLite implementations live in [`crate::engine::db_ops`]. Both traits require `Sync`
//! because the writer threads of one upload share the store while the extractor reads documents.

use anyhow::Result;

use crate::{Document, RankingDefinition, Upload};

/// Ranking graph tables plus the upload selector.
pub trait RankingStore: Sync {
    /// Select up to `batch_size` completed uploads not yet exported under `graph_key`, and record
    /// them as exported. The record rolls back with the enclosing transaction.
    fn get_uploads_for_ranking(&self, graph_key: &str, batch_size: usize) -> Result<Vec<Upload>>;

    /// Append definition rows. Duplicate rows are accepted.
    fn insert_definitions_for_ranking(
        &self,
        graph_key: &str,
        definitions: &[RankingDefinition],
    ) -> Result<()>;

    /// Append one reference row per symbol name for `upload_id`, `batch_size` rows per statement batch.
    fn insert_references_for_ranking(
        &self,
        graph_key: &str,
        batch_size: usize,
        upload_id: i64,
        symbol_names: &[String],
    ) -> Result<()>;

    /// Append one initial path-rank row per path, `batch_size` rows at a time.
    fn insert_initial_path_ranks(
        &self,
        upload_id: i64,
        document_paths: &[String],
        batch_size: usize,
        graph_key: &str,
    ) -> Result<()>;

    /// Delete definitions of `graph_key` whose upload is gone or no longer completed.
    fn vacuum_stale_definitions(&self, graph_key: &str) -> Result<usize>;

    /// Delete references of `graph_key` whose upload is gone or no longer completed.
    fn vacuum_stale_references(&self, graph_key: &str) -> Result<usize>;

    /// Delete initial path ranks of `graph_key` whose upload is gone or no longer completed.
    fn vacuum_stale_initial_paths(&self, graph_key: &str) -> Result<usize>;

    /// Run `f` in a transaction; commit on Ok, roll back on Err.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>;
}

/// Per-upload document iteration.
pub trait DocumentSource: Sync {
    /// Decode every document of `upload` in path order, reading `batch_size` documents per page,
    /// and call `on_document` for each. Stops at the first decode or callback error.
    /// Returns the number of documents visited.
    fn insert_definitions_and_references_for_document(
        &self,
        upload: &Upload,
        graph_key: &str,
        batch_size: usize,
        on_document: &mut dyn FnMut(&Document) -> Result<()>,
    ) -> Result<usize>;

    /// Run `f` in a transaction; commit on Ok, roll back on Err.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>;
}
