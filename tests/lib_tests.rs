use rankgraph::engine::path_to_db_string;
use rankgraph::pipeline::{is_skipped_symbol, join_root_path};
use rankgraph::utils::rankgraph_toml::{apply_file_to_opts, load_rankgraph_toml, parse_rankgraph_toml};
use rankgraph::{Opts, SymbolRole};
use std::path::{Path, PathBuf};

// --- path_to_db_string (path normalization for DB portability) ---

#[test]
fn test_path_to_db_string_forward_slashes() {
    assert_eq!(
        path_to_db_string(&PathBuf::from("src/main.go")),
        "src/main.go"
    );
}

#[test]
fn test_path_to_db_string_normalizes_backslashes() {
    assert_eq!(
        path_to_db_string(&PathBuf::from("src\\main.go")),
        "src/main.go"
    );
}

// --- join_root_path ---

#[test]
fn test_join_root_path_empty_root() {
    assert_eq!(join_root_path("", "a.go"), "a.go");
}

#[test]
fn test_join_root_path_with_trailing_slash() {
    assert_eq!(join_root_path("lib/", "a.go"), "lib/a.go");
}

#[test]
fn test_join_root_path_without_trailing_slash() {
    assert_eq!(join_root_path("lib/sub", "pkg/a.go"), "lib/sub/pkg/a.go");
}

#[test]
fn test_join_root_path_keeps_absolute_path_under_root() {
    assert_eq!(join_root_path("lib", "/a.go"), "lib/a.go");
    assert_eq!(join_root_path("", "/pkg/a.go"), "pkg/a.go");
}

#[test]
fn test_join_root_path_skips_current_dir_components() {
    assert_eq!(join_root_path("./", "a.go"), "a.go");
    assert_eq!(join_root_path("./lib/", "./pkg/./a.go"), "lib/pkg/a.go");
}

// --- symbol rules ---

#[test]
fn test_skipped_symbols() {
    assert!(is_skipped_symbol("", "lsif "));
    assert!(is_skipped_symbol("local 42", "lsif "));
    assert!(is_skipped_symbol("lsif . pkg x", "lsif "));
    assert!(!is_skipped_symbol("scip-go gomod pkg v1 `f`().", "lsif "));
}

#[test]
fn test_empty_skip_prefix_keeps_everything_but_locals() {
    assert!(!is_skipped_symbol("lsif . pkg x", ""));
    assert!(is_skipped_symbol("local 1", ""));
}

#[test]
fn test_symbol_role_matches() {
    assert!(SymbolRole::matches(SymbolRole::DEFINITION, SymbolRole::DEFINITION));
    assert!(SymbolRole::matches(
        SymbolRole::DEFINITION | SymbolRole::WRITE_ACCESS,
        SymbolRole::DEFINITION
    ));
    assert!(!SymbolRole::matches(SymbolRole::READ_ACCESS, SymbolRole::DEFINITION));
    assert!(!SymbolRole::matches(0, SymbolRole::DEFINITION));
}

// --- .rankgraph.toml ---

#[test]
fn test_toml_overrides_only_present_fields() {
    let file = parse_rankgraph_toml(
        r#"
        [export]
        graph_key = "nightly"
        write_batch_size = 50
        skip_prefix = ""
        enabled = false
        store_path = "graph.db"
        "#,
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, Path::new("/data"), &mut opts);

    assert_eq!(opts.graph_key, "nightly");
    assert_eq!(opts.write_batch_size, 50);
    assert_eq!(opts.export.skip_prefix, "");
    assert!(!opts.export.enabled);
    assert_eq!(opts.store_path, PathBuf::from("/data/graph.db"));
    assert_eq!(opts.read_batch_size, Opts::default().read_batch_size);
    assert_eq!(opts.documents_path, Opts::default().documents_path);
}

#[test]
fn test_toml_without_export_section_is_noop() {
    let file = parse_rankgraph_toml("").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, Path::new("."), &mut opts);
    assert_eq!(opts.graph_key, Opts::default().graph_key);
    assert!(opts.export.enabled);
}

#[test]
fn test_load_toml_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_rankgraph_toml(dir.path()).is_none());

    std::fs::write(
        dir.path().join(".rankgraph.toml"),
        "[export]\nqueue_capacity = 8\nvacuum = true\n",
    )
    .unwrap();
    let file = load_rankgraph_toml(dir.path()).unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, dir.path(), &mut opts);
    assert_eq!(opts.export.queue_capacity, 8);
    assert!(opts.vacuum);
}

#[test]
fn test_load_toml_invalid_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".rankgraph.toml"), "[export\nbroken").unwrap();
    assert!(load_rankgraph_toml(dir.path()).is_none());
}
