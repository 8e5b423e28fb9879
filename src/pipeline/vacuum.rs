//! Stale ranking data cleanup.

use anyhow::{Context, Result};
use log::debug;

use crate::VacuumSummary;

use super::error_handler::observe;
use super::stores::RankingStore;

/// Delete ranking rows of `graph_key` whose upload was deleted or left the completed state.
/// All three deletes commit together.
pub fn vacuum_stale_ranking_data<S: RankingStore>(
    store: &S,
    graph_key: &str,
) -> Result<VacuumSummary> {
    observe("vacuum", &[("graph_key", graph_key.to_string())], || {
        store.with_transaction(|| {
            let summary = VacuumSummary {
                definitions_deleted: store
                    .vacuum_stale_definitions(graph_key)
                    .context("vacuum definitions")?,
                references_deleted: store
                    .vacuum_stale_references(graph_key)
                    .context("vacuum references")?,
                initial_paths_deleted: store
                    .vacuum_stale_initial_paths(graph_key)
                    .context("vacuum initial path ranks")?,
            };
            debug!("vacuum: {:?}", summary);
            Ok(summary)
        })
    })
}
