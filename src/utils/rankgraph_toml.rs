//! Load `.rankgraph.toml` from a directory (CLI only). Lib callers pass [`ExportOpts`](crate::ExportOpts) directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Deserialize)]
pub struct RankgraphToml {
    #[serde(default)]
    export: ExportSection,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSection {
    enabled: Option<bool>,
    graph_key: Option<String>,
    read_batch_size: Option<usize>,
    write_batch_size: Option<usize>,
    queue_capacity: Option<usize>,
    skip_prefix: Option<String>,
    store_path: Option<String>,
    documents_path: Option<String>,
    encrypt: Option<bool>,
    timeout_secs: Option<u64>,
    verbose: Option<bool>,
    vacuum: Option<bool>,
}

/// Load `.rankgraph.toml` from `dir` if present. None if missing; a parse error is logged and ignored.
pub fn load_rankgraph_toml(dir: &Path) -> Option<RankgraphToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_rankgraph_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_rankgraph_toml(s: &str) -> Result<RankgraphToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+) => {
        if let Some(ref v) = $sec.$sec_field {
            $opts.$($opts_field).+ = v.clone();
        }
    };
}

/// Apply file config to opts (only fields present in the file). Relative paths resolve against `dir`.
/// Call before applying CLI.
pub fn apply_file_to_opts(file: &RankgraphToml, dir: &Path, opts: &mut Opts) {
    let sec = &file.export;
    apply_file_opt!(sec, opts, enabled => export.enabled);
    apply_file_opt!(sec, opts, queue_capacity => export.queue_capacity);
    apply_file_opt!(sec, opts, skip_prefix => export.skip_prefix);
    apply_file_opt!(sec, opts, graph_key => graph_key);
    apply_file_opt!(sec, opts, read_batch_size => read_batch_size);
    apply_file_opt!(sec, opts, write_batch_size => write_batch_size);
    if let Some(ref p) = sec.store_path {
        opts.store_path = dir.join(PathBuf::from(p));
    }
    if let Some(ref p) = sec.documents_path {
        opts.documents_path = dir.join(PathBuf::from(p));
    }
    apply_file_opt!(sec, opts, encrypt => encrypt);
    apply_file_opt!(sec, opts, timeout_secs => timeout_secs);
    apply_file_opt!(sec, opts, verbose => verbose);
    apply_file_opt!(sec, opts, vacuum => vacuum);
}
