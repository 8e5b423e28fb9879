//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    store_filename: String,
    documents_filename: String,
    config_filename: String,
    db_key_env: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                store_filename: format!("{pkg}.db"),
                documents_filename: format!("{pkg}-documents.db"),
                config_filename: format!(".{pkg}.toml"),
                db_key_env: format!("{}_DB_KEY", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn store_filename(&self) -> &str {
        &self.store_filename
    }

    pub fn documents_filename(&self) -> &str {
        &self.documents_filename
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Env var holding the SQLCipher passphrase (e.g. `RANKGRAPH_DB_KEY`).
    pub fn db_key_env(&self) -> &str {
        &self.db_key_env
    }
}

// ---- Symbols ----

/// SCIP local symbols (`local 42`) are scoped to one document and never ranked.
pub const LOCAL_SYMBOL_PREFIX: &str = "local ";

/// Symbols carried over from LSIF conversion have no stable cross-repo identity.
pub const DEFAULT_SKIP_PREFIX: &str = "lsif ";

// ---- Batching ----

/// Uploads fetched per run, and documents read per page.
pub const DEFAULT_READ_BATCH_SIZE: usize = 100;

/// Rows per insert batch for definitions, references, and path seeds.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 10_000;

// ---- Codec ----

/// Upper bound on decoded values per buffer (16M ranges). Larger zero runs are rejected as corrupt.
pub const MAX_DECODED_VALUES: usize = 1 << 26;

// ---- Streaming ----

/// Capacity of each record queue. Producer blocks when a queue is full.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4_096;

/// How often blocked producers and idle consumers re-check for cancellation (ms).
pub const CANCEL_POLL_MS: u64 = 200;

// ---- Upload state ----

/// Only uploads in this state are selected for export; rows of other uploads are stale.
pub const COMPLETED_STATE: &str = "completed";
