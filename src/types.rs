//! Public and internal types for the rankgraph API and pipeline.

use serde::{Deserialize, Serialize};

/// One previously processed unit of per-commit symbol data, ready for export. Read-only here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub id: i64,
    pub repository_id: i64,
    pub repository_name: String,
    /// Directory (relative to the repository root) the upload was indexed from, e.g. `lib/`.
    pub root: String,
}

/// A decoded document: one path and the symbol occurrences found in it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub occurrences: Vec<Occurrence>,
}

/// One symbol mention at a source range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub symbol: String,
    /// SCIP role bitset; see [`SymbolRole`].
    pub symbol_roles: u32,
    /// `[start_line, start_character, end_line, end_character]`.
    pub range: [i32; 4],
}

/// SCIP symbol role bits.
pub struct SymbolRole;

impl SymbolRole {
    pub const DEFINITION: u32 = 0x1;
    pub const IMPORT: u32 = 0x2;
    pub const WRITE_ACCESS: u32 = 0x4;
    pub const READ_ACCESS: u32 = 0x8;
    pub const GENERATED: u32 = 0x10;
    pub const TEST: u32 = 0x20;

    /// True if `roles` has every bit of `role` set.
    pub fn matches(roles: u32, role: u32) -> bool {
        roles & role == role
    }
}

/// A symbol defined by an upload, with the (root-joined) path of the defining document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingDefinition {
    pub upload_id: i64,
    pub symbol_name: String,
    pub document_path: String,
}

/// A symbol referenced, but not defined in the same document, by an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingReference {
    pub upload_id: i64,
    pub symbol_name: String,
}

/// A source span decoded from the range codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_line: i32,
    pub start_character: i32,
    pub end_line: i32,
    pub end_character: i32,
}

impl Range {
    pub fn from_quad(q: [i32; 4]) -> Self {
        Range {
            start_line: q[0],
            start_character: q[1],
            end_line: q[2],
            end_character: q[3],
        }
    }

    pub fn to_quad(self) -> [i32; 4] {
        [
            self.start_line,
            self.start_character,
            self.end_line,
            self.end_character,
        ]
    }
}

/// Counts returned by [`export`](crate::pipeline::export). All zero when the export is disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub uploads_processed: usize,
    pub definitions_inserted: usize,
    pub references_inserted: usize,
}

/// Rows removed by [`vacuum_stale_ranking_data`](crate::pipeline::vacuum_stale_ranking_data).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VacuumSummary {
    pub definitions_deleted: usize,
    pub references_deleted: usize,
    pub initial_paths_deleted: usize,
}

/// Lib-only options for [`export`](crate::pipeline::export).
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Feature switch. When false, export is a no-op that touches no store.
    pub enabled: bool,
    /// Capacity of each of the definition and reference queues.
    pub queue_capacity: usize,
    /// Symbols starting with this prefix are never exported. Empty disables the check.
    pub skip_prefix: String,
}

impl Default for ExportOpts {
    fn default() -> Self {
        use crate::utils::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SKIP_PREFIX};
        ExportOpts {
            enabled: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_prefix: DEFAULT_SKIP_PREFIX.to_string(),
        }
    }
}

/// Full options (CLI). Use [`ExportOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub export: ExportOpts,
    /// Ranking store database path.
    pub store_path: std::path::PathBuf,
    /// Document store database path.
    pub documents_path: std::path::PathBuf,
    pub graph_key: String,
    pub read_batch_size: usize,
    pub write_batch_size: usize,
    /// Open both databases with a SQLCipher key.
    pub encrypt: bool,
    /// Abort the run after this many seconds (0 = no deadline).
    pub timeout_secs: u64,
    /// Show progress bar and debug logs.
    pub verbose: bool,
    /// After exporting, delete rows of the graph key that belong to stale uploads.
    pub vacuum: bool,
}

impl Default for Opts {
    fn default() -> Self {
        use crate::utils::config::{DEFAULT_READ_BATCH_SIZE, DEFAULT_WRITE_BATCH_SIZE, PackagePaths};
        let paths = PackagePaths::get();
        Opts {
            export: ExportOpts::default(),
            store_path: paths.store_filename().into(),
            documents_path: paths.documents_filename().into(),
            graph_key: paths.pkg_name().to_string(),
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            encrypt: false,
            timeout_secs: 0,
            verbose: false,
            vacuum: false,
        }
    }
}
