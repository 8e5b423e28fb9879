use anyhow::{Context, Result, anyhow};
use log::debug;
use std::thread;

use crate::{ExportSummary, Upload};

use super::context::{ExportParams, PipelineChannels, create_pipeline_channels};
use super::error_handler::{is_queue_closed, observe};
use super::extract::extract_upload;
use super::seed::seed_initial_path_ranks;
use super::stores::{DocumentSource, RankingStore};
use super::writer::{drain_definitions, drain_references};

/// Rows written for one upload.
struct UploadCounts {
    definitions: usize,
    references: usize,
    seeds: usize,
}

/// Export the next batch of uploads for `params.graph_key`.
///
/// Disabled (`opts.enabled == false`): returns zero counts without touching either store.
/// Otherwise the whole batch runs in one ranking-store transaction that nests one document-store
/// transaction; uploads are processed one after another and any failure rolls back the batch,
/// including the export marks, so the same uploads are selected again next run.
pub fn export<S, D>(store: &S, documents: &D, params: &ExportParams<'_>) -> Result<ExportSummary>
where
    S: RankingStore,
    D: DocumentSource,
{
    if !params.opts.enabled {
        debug!("ranking export disabled; nothing to do");
        return Ok(ExportSummary::default());
    }

    let labels = [
        ("graph_key", params.graph_key.to_string()),
        ("read_batch_size", params.read_batch_size.to_string()),
        ("write_batch_size", params.write_batch_size.to_string()),
    ];
    let result = observe("export", &labels, || {
        store.with_transaction(|| {
            documents.with_transaction(|| export_batch(store, documents, params))
        })
    });
    match &result {
        Ok(summary) => debug!("state: committed ({:?})", summary),
        Err(_) => debug!("state: aborted"),
    }
    result
}

fn export_batch<S, D>(store: &S, documents: &D, params: &ExportParams<'_>) -> Result<ExportSummary>
where
    S: RankingStore,
    D: DocumentSource,
{
    debug!("state: fetching uploads");
    let uploads = store
        .get_uploads_for_ranking(params.graph_key, params.read_batch_size)
        .context("fetch uploads for ranking")?;
    debug!("fetched {} uploads for export", uploads.len());

    let mut summary = ExportSummary::default();
    for upload in &uploads {
        params.cancel.check()?;
        let labels = [
            ("upload_id", upload.id.to_string()),
            ("repository", upload.repository_name.clone()),
        ];
        let counts = observe("export_upload", &labels, || {
            export_upload(store, documents, upload, params)
        })
        .with_context(|| format!("export upload {}", upload.id))?;

        summary.uploads_processed += 1;
        summary.definitions_inserted += counts.definitions;
        summary.references_inserted += counts.references;
        debug!(
            "upload {}: {} definitions, {} references, {} path seeds",
            upload.id, counts.definitions, counts.references, counts.seeds
        );
        if let Some(cb) = params.on_upload_done.as_deref() {
            cb(1);
        }
    }
    Ok(summary)
}

/// Extract on this thread while one writer thread per queue drains into the store, then seed paths.
fn export_upload<S, D>(
    store: &S,
    documents: &D,
    upload: &Upload,
    params: &ExportParams<'_>,
) -> Result<UploadCounts>
where
    S: RankingStore,
    D: DocumentSource,
{
    let PipelineChannels {
        definition_tx,
        definition_rx,
        reference_tx,
        reference_rx,
    } = create_pipeline_channels(params.opts.queue_capacity);
    let graph_key = params.graph_key;
    let write_batch_size = params.write_batch_size;
    let cancel = params.cancel;

    debug!("state: extracting + writing (upload {})", upload.id);
    let (extracted, definitions, references) = thread::scope(|s| {
        let definition_writer = s.spawn(move || {
            drain_definitions(store, graph_key, write_batch_size, definition_rx, cancel)
        });
        let reference_writer = s.spawn(move || {
            drain_references(
                store,
                graph_key,
                write_batch_size,
                upload.id,
                reference_rx,
                cancel,
            )
        });

        let extracted = extract_upload(documents, upload, params, definition_tx, reference_tx);

        let definitions = definition_writer
            .join()
            .unwrap_or_else(|_| Err(anyhow!("definition writer panicked")));
        let references = reference_writer
            .join()
            .unwrap_or_else(|_| Err(anyhow!("reference writer panicked")));
        (extracted, definitions, references)
    });

    let paths = match extracted {
        // The extractor only sees a closed queue when a writer quit first; report the writer's error.
        Err(e) if is_queue_closed(&e) => {
            return Err(match (definitions, references) {
                (Err(d), _) => d.context("write definitions"),
                (_, Err(r)) => r.context("write references"),
                _ => e,
            });
        }
        Err(e) => return Err(e),
        Ok(paths) => paths,
    };
    let definitions = definitions.context("write definitions")?;
    let references = references.context("write references")?;

    debug!("state: seeding path ranks (upload {})", upload.id);
    let seeds = seed_initial_path_ranks(
        store,
        upload.id,
        &paths,
        params.write_batch_size,
        params.graph_key,
    )
    .context("seed initial path ranks")?;

    Ok(UploadCounts {
        definitions,
        references,
        seeds,
    })
}
