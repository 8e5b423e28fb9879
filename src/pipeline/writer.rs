//! Definition/reference writers: drain one queue into batched store inserts.

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{RankingDefinition, RankingReference};

use super::context::{Cancellation, poll_interval};
use super::error_handler::ExportError;
use super::stores::RankingStore;

/// Receive until the producer closes the queue, calling `flush` for every `batch_size` items and
/// once for the remainder. Returns the number of items flushed.
///
/// After a failed flush nothing more is written, but the queue is still drained until the
/// producer closes it, so the producer can never block on a full queue; the first error is then
/// returned. On cancellation the receiver is dropped right away, which makes the producer's next
/// send fail.
pub fn drain_in_batches<T>(
    rx: Receiver<T>,
    batch_size: usize,
    cancel: &Cancellation,
    mut flush: impl FnMut(&[T]) -> Result<()>,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut written = 0_usize;
    let mut failed: Option<anyhow::Error> = None;

    loop {
        match rx.recv_timeout(poll_interval()) {
            Ok(item) => {
                if failed.is_some() {
                    continue;
                }
                batch.push(item);
                if batch.len() >= batch_size {
                    if cancel.is_cancelled() {
                        return Err(ExportError::Cancelled.into());
                    }
                    match flush(&batch) {
                        Ok(()) => written += batch.len(),
                        Err(e) => {
                            log::warn!("write failed; draining queue before reporting: {:#}", e);
                            failed = Some(e);
                        }
                    }
                    batch.clear();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    return Err(failed.unwrap_or_else(|| ExportError::Cancelled.into()));
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(e) = failed {
        return Err(e);
    }
    if !batch.is_empty() {
        flush(&batch)?;
        written += batch.len();
    }
    Ok(written)
}

/// Consumer for the definition queue.
pub fn drain_definitions<S: RankingStore>(
    store: &S,
    graph_key: &str,
    batch_size: usize,
    rx: Receiver<RankingDefinition>,
    cancel: &Cancellation,
) -> Result<usize> {
    drain_in_batches(rx, batch_size, cancel, |batch| {
        store.insert_definitions_for_ranking(graph_key, batch)
    })
}

/// Consumer for the reference queue of one upload.
pub fn drain_references<S: RankingStore>(
    store: &S,
    graph_key: &str,
    batch_size: usize,
    upload_id: i64,
    rx: Receiver<RankingReference>,
    cancel: &Cancellation,
) -> Result<usize> {
    drain_in_batches(rx, batch_size, cancel, |batch| {
        let names: Vec<String> = batch.iter().map(|r| r.symbol_name.clone()).collect();
        store.insert_references_for_ranking(graph_key, batch_size, upload_id, &names)
    })
}
