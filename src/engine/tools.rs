//! Path and run-setup utilities

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::pipeline::Cancellation;

/// Path as stored in the ranking tables: `/`-separated regardless of platform.
pub fn path_to_db_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Build the run's cancellation: Ctrl+C sets the flag; `timeout_secs > 0` adds a deadline.
pub fn install_cancellation(timeout_secs: u64) -> Result<Cancellation> {
    let cancel = if timeout_secs > 0 {
        Cancellation::new().with_timeout(Duration::from_secs(timeout_secs))
    } else {
        Cancellation::new()
    };
    let flag = cancel.flag();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;
    Ok(cancel)
}
