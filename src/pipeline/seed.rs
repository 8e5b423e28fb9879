//! Path rank seeder.

use anyhow::Result;

use super::stores::RankingStore;

/// Insert one initial path-rank row per path for `upload_id`. No store call for an empty set.
/// Returns the number of seeds written.
pub fn seed_initial_path_ranks<S: RankingStore>(
    store: &S,
    upload_id: i64,
    document_paths: &[String],
    batch_size: usize,
    graph_key: &str,
) -> Result<usize> {
    if document_paths.is_empty() {
        return Ok(0);
    }
    store.insert_initial_path_ranks(upload_id, document_paths, batch_size, graph_key)?;
    Ok(document_paths.len())
}
