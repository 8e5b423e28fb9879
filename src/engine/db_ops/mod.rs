//! Database operations: schema, open, transactions, ranking store and document store.

mod connection;
mod documents;
mod ranking;

pub use connection::{open_db, open_db_in_memory};
pub use documents::SqliteDocumentStore;
pub use ranking::SqliteRankingStore;

pub(crate) use connection::{lock_conn, with_transaction};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Schema for the ranking store: uploads, export bookkeeping, and the graph tables.
pub const RANKING_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    repository_id INTEGER NOT NULL,
    repository_name TEXT NOT NULL,
    root TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT 'completed'
);

CREATE TABLE IF NOT EXISTS ranking_exports (
    upload_id INTEGER NOT NULL,
    graph_key TEXT NOT NULL,
    PRIMARY KEY (upload_id, graph_key)
);

CREATE TABLE IF NOT EXISTS ranking_definitions (
    id INTEGER PRIMARY KEY,
    upload_id INTEGER NOT NULL,
    symbol_name TEXT NOT NULL,
    document_path TEXT NOT NULL,
    graph_key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ranking_definitions_graph_key
    ON ranking_definitions(graph_key, symbol_name);

CREATE TABLE IF NOT EXISTS ranking_references (
    id INTEGER PRIMARY KEY,
    upload_id INTEGER NOT NULL,
    symbol_name TEXT NOT NULL,
    graph_key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ranking_references_graph_key
    ON ranking_references(graph_key, upload_id);

CREATE TABLE IF NOT EXISTS ranking_initial_path_ranks (
    id INTEGER PRIMARY KEY,
    upload_id INTEGER NOT NULL,
    document_path TEXT NOT NULL,
    graph_key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ranking_initial_path_ranks_graph_key
    ON ranking_initial_path_ranks(graph_key, upload_id);
"#;

/// Schema for the document store. `ranges` holds one codec-encoded quad per entry of `symbols`.
pub const DOCUMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    upload_id INTEGER NOT NULL,
    path TEXT NOT NULL,
    symbols TEXT NOT NULL,
    ranges BLOB NOT NULL,
    PRIMARY KEY (upload_id, path)
);
"#;

pub(crate) const INSERT_DEFINITION_SQL: &str = "INSERT INTO ranking_definitions (upload_id, symbol_name, document_path, graph_key) VALUES (?1, ?2, ?3, ?4)";

pub(crate) const INSERT_REFERENCE_SQL: &str =
    "INSERT INTO ranking_references (upload_id, symbol_name, graph_key) VALUES (?1, ?2, ?3)";

pub(crate) const INSERT_INITIAL_PATH_RANK_SQL: &str = "INSERT INTO ranking_initial_path_ranks (upload_id, document_path, graph_key) VALUES (?1, ?2, ?3)";
