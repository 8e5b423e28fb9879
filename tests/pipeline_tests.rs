//! Export driver: extraction rules, writers, transactions, failure and cancellation paths.

use anyhow::{Result, anyhow};
use rankgraph::engine::{
    DOCUMENTS_SCHEMA, SqliteDocumentStore, SqliteRankingStore, open_db_in_memory,
};
use rankgraph::pipeline::{
    Cancellation, ExportParams, classify_document, drain_in_batches, export, is_benign,
    seed_initial_path_ranks, vacuum_stale_ranking_data,
};
use rankgraph::{
    Document, DocumentSource, ExportError, ExportOpts, ExportSummary, Occurrence,
    RankingDefinition, RankingReference, RankingStore, SymbolRole, Upload,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn upload(id: i64, root: &str) -> Upload {
    Upload {
        id,
        repository_id: 1,
        repository_name: "github.com/example/repo".into(),
        root: root.into(),
    }
}

fn def(symbol: &str, range: [i32; 4]) -> Occurrence {
    Occurrence {
        symbol: symbol.into(),
        symbol_roles: SymbolRole::DEFINITION,
        range,
    }
}

fn reference(symbol: &str, range: [i32; 4]) -> Occurrence {
    Occurrence {
        symbol: symbol.into(),
        symbol_roles: SymbolRole::READ_ACCESS,
        range,
    }
}

fn params<'a>(opts: &'a ExportOpts, cancel: &'a Cancellation) -> ExportParams<'a> {
    ExportParams {
        graph_key: "k",
        read_batch_size: 10,
        write_batch_size: 2,
        opts,
        cancel,
        on_upload_done: None,
    }
}

// --- mock stores ---

#[derive(Default)]
struct MockStore {
    uploads: Vec<Upload>,
    fail_definitions: bool,
    /// Cancelled from inside the first definition write.
    cancel_on_write: Option<Cancellation>,
    calls: AtomicUsize,
    definitions: Mutex<Vec<RankingDefinition>>,
    references: Mutex<Vec<(i64, String)>>,
    seeds: Mutex<Vec<(i64, String)>>,
}

impl MockStore {
    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl RankingStore for MockStore {
    fn get_uploads_for_ranking(&self, _graph_key: &str, batch_size: usize) -> Result<Vec<Upload>> {
        self.call();
        Ok(self.uploads.iter().take(batch_size).cloned().collect())
    }

    fn insert_definitions_for_ranking(
        &self,
        _graph_key: &str,
        definitions: &[RankingDefinition],
    ) -> Result<()> {
        self.call();
        if let Some(cancel) = &self.cancel_on_write {
            cancel.cancel();
        }
        if self.fail_definitions {
            return Err(anyhow!("disk full"));
        }
        self.definitions.lock().unwrap().extend_from_slice(definitions);
        Ok(())
    }

    fn insert_references_for_ranking(
        &self,
        _graph_key: &str,
        _batch_size: usize,
        upload_id: i64,
        symbol_names: &[String],
    ) -> Result<()> {
        self.call();
        let mut refs = self.references.lock().unwrap();
        refs.extend(symbol_names.iter().map(|s| (upload_id, s.clone())));
        Ok(())
    }

    fn insert_initial_path_ranks(
        &self,
        upload_id: i64,
        document_paths: &[String],
        _batch_size: usize,
        _graph_key: &str,
    ) -> Result<()> {
        self.call();
        let mut seeds = self.seeds.lock().unwrap();
        seeds.extend(document_paths.iter().map(|p| (upload_id, p.clone())));
        Ok(())
    }

    fn vacuum_stale_definitions(&self, _graph_key: &str) -> Result<usize> {
        self.call();
        Ok(1)
    }

    fn vacuum_stale_references(&self, _graph_key: &str) -> Result<usize> {
        self.call();
        Ok(2)
    }

    fn vacuum_stale_initial_paths(&self, _graph_key: &str) -> Result<usize> {
        self.call();
        Ok(3)
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.call();
        f()
    }
}

#[derive(Default)]
struct MockDocuments {
    documents: Vec<(i64, Document)>,
    calls: AtomicUsize,
}

impl DocumentSource for MockDocuments {
    fn insert_definitions_and_references_for_document(
        &self,
        upload: &Upload,
        _graph_key: &str,
        _batch_size: usize,
        on_document: &mut dyn FnMut(&Document) -> Result<()>,
    ) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut visited = 0;
        for (_, doc) in self.documents.iter().filter(|(id, _)| *id == upload.id) {
            on_document(doc)?;
            visited += 1;
        }
        Ok(visited)
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        f()
    }
}

// --- classification ---

#[test]
fn test_classify_definition_and_reference() {
    let doc = Document {
        path: "a.go".into(),
        occurrences: vec![def("f", [0, 0, 0, 1]), reference("g", [1, 0, 1, 1])],
    };
    let (defs, refs) = classify_document(&upload(1, ""), &doc, "lsif ");
    assert_eq!(
        defs,
        vec![RankingDefinition {
            upload_id: 1,
            symbol_name: "f".into(),
            document_path: "a.go".into(),
        }]
    );
    assert_eq!(
        refs,
        vec![RankingReference {
            upload_id: 1,
            symbol_name: "g".into(),
        }]
    );
}

#[test]
fn test_classify_first_definition_wins() {
    let doc = Document {
        path: "a.go".into(),
        occurrences: vec![
            def("f", [0, 0, 0, 1]),
            def("f", [5, 0, 5, 1]),
            reference("f", [9, 0, 9, 1]),
        ],
    };
    let (defs, refs) = classify_document(&upload(1, ""), &doc, "lsif ");
    assert_eq!(defs.len(), 1);
    assert!(refs.is_empty());
}

#[test]
fn test_classify_repeated_references_and_reference_before_definition() {
    let doc = Document {
        path: "a.go".into(),
        occurrences: vec![
            reference("g", [0, 0, 0, 1]),
            reference("g", [1, 0, 1, 1]),
            def("g", [2, 0, 2, 1]),
            reference("g", [3, 0, 3, 1]),
        ],
    };
    let (defs, refs) = classify_document(&upload(1, ""), &doc, "lsif ");
    assert_eq!(defs.len(), 1);
    assert_eq!(refs.len(), 2);
}

#[test]
fn test_classify_skips_local_lsif_and_empty_symbols() {
    let doc = Document {
        path: "a.go".into(),
        occurrences: vec![
            def("local 1", [0, 0, 0, 1]),
            reference("lsif . x", [1, 0, 1, 1]),
            reference("", [2, 0, 2, 1]),
        ],
    };
    let (defs, refs) = classify_document(&upload(1, ""), &doc, "lsif ");
    assert!(defs.is_empty());
    assert!(refs.is_empty());
}

#[test]
fn test_classify_joins_upload_root() {
    let doc = Document {
        path: "a.go".into(),
        occurrences: vec![def("f", [0, 0, 0, 1])],
    };
    let (defs, _) = classify_document(&upload(1, "lib/"), &doc, "lsif ");
    assert_eq!(defs[0].document_path, "lib/a.go");
}

// --- writers ---

#[test]
fn test_drain_in_batches_flushes_full_batches_and_remainder() {
    let (tx, rx) = crossbeam_channel::bounded(2);
    let producer = std::thread::spawn(move || {
        for i in 0..7 {
            tx.send(i).unwrap();
        }
    });
    let mut batches = Vec::new();
    let written = drain_in_batches(rx, 3, &Cancellation::new(), |b: &[i32]| {
        batches.push(b.to_vec());
        Ok(())
    })
    .unwrap();
    producer.join().unwrap();
    assert_eq!(written, 7);
    assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
}

#[test]
fn test_drain_in_batches_keeps_draining_after_failure() {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let producer = std::thread::spawn(move || {
        for i in 0..100 {
            tx.send(i).unwrap();
        }
    });
    let flushes = AtomicUsize::new(0);
    let err = drain_in_batches(rx, 1, &Cancellation::new(), |_: &[i32]| {
        flushes.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("write failed"))
    })
    .unwrap_err();
    // Producer never blocked forever: every send succeeded.
    producer.join().unwrap();
    assert_eq!(flushes.load(Ordering::SeqCst), 1);
    assert_eq!(err.to_string(), "write failed");
}

// --- seed ---

#[test]
fn test_seed_empty_paths_makes_no_store_call() {
    let store = MockStore::default();
    assert_eq!(seed_initial_path_ranks(&store, 1, &[], 10, "k").unwrap(), 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

// --- export ---

#[test]
fn test_disabled_export_touches_no_store() {
    let store = MockStore {
        uploads: vec![upload(1, "")],
        ..Default::default()
    };
    let documents = MockDocuments::default();
    let opts = ExportOpts {
        enabled: false,
        ..Default::default()
    };
    let cancel = Cancellation::new();
    let summary = export(&store, &documents, &params(&opts, &cancel)).unwrap();
    assert_eq!(summary, ExportSummary::default());
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert_eq!(documents.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_export_single_document_end_to_end() {
    let store = MockStore {
        uploads: vec![upload(1, "")],
        ..Default::default()
    };
    let documents = MockDocuments {
        documents: vec![(
            1,
            Document {
                path: "a.go".into(),
                occurrences: vec![def("f", [0, 0, 0, 1]), reference("g", [1, 0, 1, 1])],
            },
        )],
        ..Default::default()
    };
    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    let summary = export(&store, &documents, &params(&opts, &cancel)).unwrap();

    assert_eq!(
        summary,
        ExportSummary {
            uploads_processed: 1,
            definitions_inserted: 1,
            references_inserted: 1,
        }
    );
    assert_eq!(
        *store.definitions.lock().unwrap(),
        vec![RankingDefinition {
            upload_id: 1,
            symbol_name: "f".into(),
            document_path: "a.go".into(),
        }]
    );
    assert_eq!(*store.references.lock().unwrap(), vec![(1, "g".to_string())]);
    assert_eq!(*store.seeds.lock().unwrap(), vec![(1, "a.go".to_string())]);
}

#[test]
fn test_export_with_no_uploads() {
    let store = MockStore::default();
    let documents = MockDocuments::default();
    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    let summary = export(&store, &documents, &params(&opts, &cancel)).unwrap();
    assert_eq!(summary, ExportSummary::default());
    assert!(store.seeds.lock().unwrap().is_empty());
}

#[test]
fn test_export_many_records_through_small_queues() {
    let occurrences: Vec<Occurrence> = (0..500)
        .flat_map(|i| {
            [
                def(&format!("d{i}"), [i, 0, i, 1]),
                reference(&format!("r{i}"), [i, 2, i, 3]),
            ]
        })
        .collect();
    let store = MockStore {
        uploads: vec![upload(1, ""), upload(2, "sub/")],
        ..Default::default()
    };
    let documents = MockDocuments {
        documents: vec![
            (
                1,
                Document {
                    path: "a.go".into(),
                    occurrences: occurrences.clone(),
                },
            ),
            (
                2,
                Document {
                    path: "b.go".into(),
                    occurrences,
                },
            ),
        ],
        ..Default::default()
    };
    let opts = ExportOpts {
        queue_capacity: 1,
        ..Default::default()
    };
    let cancel = Cancellation::new();
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let mut p = params(&opts, &cancel);
    p.write_batch_size = 7;
    p.on_upload_done = Some(Box::new(move |n| {
        counter.fetch_add(n, Ordering::SeqCst);
    }));

    let summary = export(&store, &documents, &p).unwrap();
    assert_eq!(summary.uploads_processed, 2);
    assert_eq!(summary.definitions_inserted, 1000);
    assert_eq!(summary.references_inserted, 1000);
    assert_eq!(done.load(Ordering::SeqCst), 2);
    assert_eq!(
        *store.seeds.lock().unwrap(),
        vec![(1, "a.go".to_string()), (2, "sub/b.go".to_string())]
    );
}

#[test]
fn test_store_failure_propagates_without_deadlock() {
    let occurrences: Vec<Occurrence> = (0..300).map(|i| def(&format!("d{i}"), [i, 0, i, 1])).collect();
    let store = MockStore {
        uploads: vec![upload(1, "")],
        fail_definitions: true,
        ..Default::default()
    };
    let documents = MockDocuments {
        documents: vec![(
            1,
            Document {
                path: "a.go".into(),
                occurrences,
            },
        )],
        ..Default::default()
    };
    let opts = ExportOpts {
        queue_capacity: 1,
        ..Default::default()
    };
    let cancel = Cancellation::new();
    let err = export(&store, &documents, &params(&opts, &cancel)).unwrap_err();
    assert!(format!("{:#}", err).contains("disk full"));
    assert!(!is_benign(&err));
    assert!(store.seeds.lock().unwrap().is_empty());
}

#[test]
fn test_cancelled_export_returns_cancelled() {
    let store = MockStore {
        uploads: vec![upload(1, "")],
        ..Default::default()
    };
    let documents = MockDocuments::default();
    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = export(&store, &documents, &params(&opts, &cancel)).unwrap_err();
    assert!(is_benign(&err));
    assert!(matches!(
        err.chain().find_map(|e| e.downcast_ref::<ExportError>()),
        Some(ExportError::Cancelled)
    ));
}

#[test]
fn test_cancel_mid_upload_releases_blocked_extractor() {
    let occurrences: Vec<Occurrence> = (0..5_000)
        .flat_map(|i| {
            [
                def(&format!("d{i}"), [i, 0, i, 1]),
                reference(&format!("r{i}"), [i, 2, i, 3]),
            ]
        })
        .collect();
    let cancel = Cancellation::new();
    let store = MockStore {
        uploads: vec![upload(1, "")],
        cancel_on_write: Some(cancel.clone()),
        ..Default::default()
    };
    let documents = MockDocuments {
        documents: vec![(
            1,
            Document {
                path: "a.go".into(),
                occurrences,
            },
        )],
        ..Default::default()
    };
    let opts = ExportOpts {
        queue_capacity: 1,
        ..Default::default()
    };

    let start = Instant::now();
    let err = export(&store, &documents, &params(&opts, &cancel)).unwrap_err();
    let elapsed = start.elapsed();

    assert!(is_benign(&err), "{:#}", err);
    // Writers and the extractor each notice within one poll interval.
    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    assert!(store.definitions.lock().unwrap().len() < 5_000);
    assert!(store.seeds.lock().unwrap().is_empty());
}

#[test]
fn test_expired_deadline_cancels() {
    let cancel = Cancellation::new().with_timeout(Duration::ZERO);
    assert!(cancel.is_cancelled());
    assert!(is_benign(&cancel.check().unwrap_err()));
}

// --- export over SQLite ---

/// Document store holding one row written straight through SQL, bypassing the encoder.
fn documents_with_raw_row(upload_id: i64, path: &str, symbols: &str, ranges: &[u8]) -> SqliteDocumentStore {
    let conn = open_db_in_memory(DOCUMENTS_SCHEMA).unwrap();
    conn.execute(
        "INSERT INTO documents (upload_id, path, symbols, ranges) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![upload_id, path, symbols, ranges],
    )
    .unwrap();
    SqliteDocumentStore::from_connection(conn)
}

fn sqlite_fixture() -> (SqliteRankingStore, SqliteDocumentStore) {
    sqlite_fixture_with(SqliteDocumentStore::open_in_memory().unwrap())
}

/// Uploads 1 (root "") and 2 (root "lib/") with one document each, added to `documents`.
fn sqlite_fixture_with(documents: SqliteDocumentStore) -> (SqliteRankingStore, SqliteDocumentStore) {
    let store = SqliteRankingStore::open_in_memory().unwrap();
    store.insert_upload(&upload(1, ""), "completed").unwrap();
    store.insert_upload(&upload(2, "lib/"), "completed").unwrap();
    documents
        .insert_document(
            1,
            &Document {
                path: "a.go".into(),
                occurrences: vec![def("f", [0, 0, 0, 1]), reference("g", [1, 0, 1, 1])],
            },
        )
        .unwrap();
    documents
        .insert_document(
            2,
            &Document {
                path: "b.go".into(),
                occurrences: vec![def("g", [0, 0, 0, 1]), reference("f", [3, 4, 3, 5])],
            },
        )
        .unwrap();
    (store, documents)
}

#[test]
fn test_sqlite_export_commits_batch() {
    let (store, documents) = sqlite_fixture();
    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    let summary = export(&store, &documents, &params(&opts, &cancel)).unwrap();

    assert_eq!(summary.uploads_processed, 2);
    assert_eq!(store.exported_upload_ids("k").unwrap(), vec![1, 2]);
    assert_eq!(
        store.definitions("k").unwrap(),
        vec![
            RankingDefinition {
                upload_id: 1,
                symbol_name: "f".into(),
                document_path: "a.go".into(),
            },
            RankingDefinition {
                upload_id: 2,
                symbol_name: "g".into(),
                document_path: "lib/b.go".into(),
            },
        ]
    );
    assert_eq!(store.references("k").unwrap().len(), 2);
    assert_eq!(
        store.initial_path_ranks("k").unwrap(),
        vec![(1, "a.go".to_string()), (2, "lib/b.go".to_string())]
    );

    // Nothing left to export under this key.
    let again = export(&store, &documents, &params(&opts, &cancel)).unwrap();
    assert_eq!(again.uploads_processed, 0);
}

#[test]
fn test_sqlite_decode_failure_rolls_back_whole_batch() {
    let (store, documents) = sqlite_fixture_with(documents_with_raw_row(
        3,
        "bad.go",
        r#"[{"symbol":"f","roles":1}]"#,
        &[0x80],
    ));
    store.insert_upload(&upload(3, ""), "completed").unwrap();

    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    let err = export(&store, &documents, &params(&opts, &cancel)).unwrap_err();
    assert!(format!("{:#}", err).contains("bad.go"));

    assert!(store.exported_upload_ids("k").unwrap().is_empty());
    assert!(store.definitions("k").unwrap().is_empty());
    assert!(store.references("k").unwrap().is_empty());
    assert!(store.initial_path_ranks("k").unwrap().is_empty());
}

#[test]
fn test_sqlite_cancelled_batch_is_retried() {
    let (store, documents) = sqlite_fixture();
    let opts = ExportOpts::default();
    let cancelled = Cancellation::new();
    cancelled.cancel();
    let err = export(&store, &documents, &params(&opts, &cancelled)).unwrap_err();
    assert!(is_benign(&err));
    assert!(store.exported_upload_ids("k").unwrap().is_empty());

    let cancel = Cancellation::new();
    let summary = export(&store, &documents, &params(&opts, &cancel)).unwrap();
    assert_eq!(summary.uploads_processed, 2);
}

#[test]
fn test_sqlite_vacuum_after_upload_deleted() {
    let (store, documents) = sqlite_fixture();
    let opts = ExportOpts::default();
    let cancel = Cancellation::new();
    export(&store, &documents, &params(&opts, &cancel)).unwrap();
    store.set_upload_state(2, "deleted").unwrap();

    let vacuumed = vacuum_stale_ranking_data(&store, "k").unwrap();
    assert_eq!(vacuumed.definitions_deleted, 1);
    assert_eq!(vacuumed.references_deleted, 1);
    assert_eq!(vacuumed.initial_paths_deleted, 1);
    assert_eq!(store.definitions("k").unwrap()[0].upload_id, 1);
}

#[test]
fn test_vacuum_runs_in_one_transaction() {
    let store = MockStore::default();
    let summary = vacuum_stale_ranking_data(&store, "k").unwrap();
    assert_eq!(summary.definitions_deleted, 1);
    assert_eq!(summary.references_deleted, 2);
    assert_eq!(summary.initial_paths_deleted, 3);
    // One transaction plus three deletes.
    assert_eq!(store.calls.load(Ordering::SeqCst), 4);
}
