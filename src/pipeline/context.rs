//! Pipeline context: record queues and the cancellation signal shared by producer and writers.

use anyhow::Result;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::utils::config::CANCEL_POLL_MS;
use crate::{ExportOpts, RankingDefinition, RankingReference};

use super::error_handler::ExportError;

/// Ctrl+C flag plus optional deadline. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also cancel once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Shared flag for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(ExportError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ExportError::Cancelled.into());
        }
        Ok(())
    }
}

/// Parameters for [`export`](super::export).
pub struct ExportParams<'a> {
    /// Tags every row written by this run.
    pub graph_key: &'a str,
    /// Uploads fetched per run and documents read per page.
    pub read_batch_size: usize,
    /// Rows per insert batch.
    pub write_batch_size: usize,
    pub opts: &'a ExportOpts,
    pub cancel: &'a Cancellation,
    /// Called with 1 after each upload is fully exported.
    pub on_upload_done: Option<Box<dyn Fn(usize) + Send>>,
}

/// Two independent bounded queues for one upload: extractor → definition writer, extractor → reference writer.
pub struct PipelineChannels {
    pub definition_tx: Sender<RankingDefinition>,
    pub definition_rx: Receiver<RankingDefinition>,
    pub reference_tx: Sender<RankingReference>,
    pub reference_rx: Receiver<RankingReference>,
}

pub fn create_pipeline_channels(capacity: usize) -> PipelineChannels {
    let (definition_tx, definition_rx) = bounded::<RankingDefinition>(capacity.max(1));
    let (reference_tx, reference_rx) = bounded::<RankingReference>(capacity.max(1));
    PipelineChannels {
        definition_tx,
        definition_rx,
        reference_tx,
        reference_rx,
    }
}

pub(crate) fn poll_interval() -> Duration {
    Duration::from_millis(CANCEL_POLL_MS)
}

/// Blocking send that re-checks `cancel` while the queue is full.
/// Fails with [`ExportError::QueueClosed`] if the writer has gone away.
pub(crate) fn send_or_cancel<T>(
    tx: &Sender<T>,
    item: T,
    cancel: &Cancellation,
    queue: &'static str,
) -> Result<()> {
    let mut item = item;
    loop {
        match tx.send_timeout(item, poll_interval()) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(back)) => {
                cancel.check()?;
                item = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(ExportError::QueueClosed(queue).into());
            }
        }
    }
}
