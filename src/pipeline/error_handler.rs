use anyhow::Result;
use log::{debug, info, warn};
use std::time::Instant;

/// Pipeline-level failures that callers may want to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Ctrl+C or deadline. Not counted as a failure.
    #[error("export cancelled")]
    Cancelled,

    #[error("{0} queue closed before the extractor finished")]
    QueueClosed(&'static str),
}

/// True for errors that are expected stops rather than failures (cancellation).
pub fn is_benign(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<ExportError>(), Some(ExportError::Cancelled)))
}

/// True if the error chain contains a closed queue, i.e. the writer left first.
pub(crate) fn is_queue_closed(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<ExportError>(), Some(ExportError::QueueClosed(_))))
}

/// Run `f` as a named operation: debug-log start/finish with labels and elapsed time, warn on
/// failure. Benign errors are logged at info instead.
pub fn observe<T>(
    operation: &str,
    labels: &[(&str, String)],
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let labels = labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    let start = Instant::now();
    debug!("{} started [{}]", operation, labels);
    let result = f();
    match &result {
        Ok(_) => debug!(
            "{} finished in {:?} [{}]",
            operation,
            start.elapsed(),
            labels
        ),
        Err(e) if is_benign(e) => info!("{} stopped: {} [{}]", operation, e, labels),
        Err(e) => warn!(
            "{} failed after {:?} [{}]: {:#}",
            operation,
            start.elapsed(),
            labels,
            e
        ),
    }
    result
}
