//! rankgraph: export per-upload code-intelligence symbol data into ranking graph tables,
//! plus the compact range codec used by the document store.

pub mod codec;
pub mod engine;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use codec::{CodecError, decode_flattened_ranges, decode_ranges, encode_ranges};
pub use pipeline::{
    Cancellation, DocumentSource, ExportError, ExportParams, RankingStore, export,
    vacuum_stale_ranking_data,
};

use log::debug;

/// Result alias used by public rankgraph API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Export one batch with `opts` and no progress callback.
///
/// Convenience over [`export`] for library callers that hold their own stores:
///
/// ```ignore
/// let store = rankgraph::engine::SqliteRankingStore::open_in_memory()?;
/// let documents = rankgraph::engine::SqliteDocumentStore::open_in_memory()?;
/// let summary = rankgraph::export_ranking_graph(&store, &documents, "dev", &ExportOpts::default(), &Cancellation::new())?;
/// ```
pub fn export_ranking_graph<S, D>(
    store: &S,
    documents: &D,
    graph_key: &str,
    opts: &ExportOpts,
    cancel: &Cancellation,
) -> Result<ExportSummary>
where
    S: RankingStore,
    D: DocumentSource,
{
    use utils::config::{DEFAULT_READ_BATCH_SIZE, DEFAULT_WRITE_BATCH_SIZE};
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let params = ExportParams {
        graph_key,
        read_batch_size: DEFAULT_READ_BATCH_SIZE,
        write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
        opts,
        cancel,
        on_upload_done: None,
    };
    export(store, documents, &params)
}
