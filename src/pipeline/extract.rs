//! Document extractor: classify symbol occurrences into definitions and references.

use anyhow::Result;
use crossbeam_channel::Sender;
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::engine::tools::path_to_db_string;
use crate::utils::config::LOCAL_SYMBOL_PREFIX;
use crate::{Document, RankingDefinition, RankingReference, SymbolRole, Upload};

use super::context::{Cancellation, ExportParams, send_or_cancel};
use super::error_handler::{is_benign, is_queue_closed};
use super::stores::DocumentSource;

/// True if the symbol never takes part in ranking: empty, document-local, or under `skip_prefix`.
pub fn is_skipped_symbol(symbol: &str, skip_prefix: &str) -> bool {
    symbol.is_empty()
        || symbol.starts_with(LOCAL_SYMBOL_PREFIX)
        || (!skip_prefix.is_empty() && symbol.starts_with(skip_prefix))
}

/// Join an upload root and a document path the way paths are stored (`lib/` + `a.go` → `lib/a.go`).
/// The document path always lands under the root: a leading `/` is dropped and `.` components are skipped.
pub fn join_root_path(root: &str, path: &str) -> String {
    let mut joined = PathBuf::new();
    for component in Path::new(root).components() {
        if component != Component::CurDir {
            joined.push(component);
        }
    }
    for component in Path::new(path).components() {
        if let Component::Normal(_) | Component::ParentDir = component {
            joined.push(component);
        }
    }
    path_to_db_string(&joined)
}

/// Per-upload extraction state: the deduplicated set of document paths seen so far.
pub struct DocumentExtractor<'a> {
    upload: &'a Upload,
    skip_prefix: &'a str,
    paths: BTreeSet<String>,
}

impl<'a> DocumentExtractor<'a> {
    pub fn new(upload: &'a Upload, skip_prefix: &'a str) -> Self {
        Self {
            upload,
            skip_prefix,
            paths: BTreeSet::new(),
        }
    }

    /// Classify one document. The first definition of a symbol wins; later definitions and any
    /// later mention of that symbol are dropped. References to symbols not (yet) defined in the
    /// document are emitted once per occurrence.
    pub fn extract_document(
        &mut self,
        document: &Document,
        mut on_definition: impl FnMut(RankingDefinition) -> Result<()>,
        mut on_reference: impl FnMut(RankingReference) -> Result<()>,
    ) -> Result<()> {
        let document_path = join_root_path(&self.upload.root, &document.path);
        let mut seen: HashSet<&str> = HashSet::new();

        for occurrence in &document.occurrences {
            let symbol = occurrence.symbol.as_str();
            if is_skipped_symbol(symbol, self.skip_prefix) || seen.contains(symbol) {
                continue;
            }
            if SymbolRole::matches(occurrence.symbol_roles, SymbolRole::DEFINITION) {
                seen.insert(symbol);
                on_definition(RankingDefinition {
                    upload_id: self.upload.id,
                    symbol_name: symbol.to_string(),
                    document_path: document_path.clone(),
                })?;
            } else {
                on_reference(RankingReference {
                    upload_id: self.upload.id,
                    symbol_name: symbol.to_string(),
                })?;
            }
        }

        self.paths.insert(document_path);
        Ok(())
    }

    /// Sorted, deduplicated root-joined paths of every document extracted.
    pub fn into_paths(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

/// Classify one document into vectors. Same rules as [`DocumentExtractor::extract_document`].
pub fn classify_document(
    upload: &Upload,
    document: &Document,
    skip_prefix: &str,
) -> (Vec<RankingDefinition>, Vec<RankingReference>) {
    let mut definitions = Vec::new();
    let mut references = Vec::new();
    let mut extractor = DocumentExtractor::new(upload, skip_prefix);
    let collected = extractor.extract_document(
        document,
        |d| {
            definitions.push(d);
            Ok(())
        },
        |r| {
            references.push(r);
            Ok(())
        },
    );
    debug_assert!(collected.is_ok());
    (definitions, references)
}

/// Producer for one upload: stream its documents into the two queues. Both senders are dropped
/// on return, which closes the queues and lets the writers finish.
/// Returns the touched document paths.
pub fn extract_upload<D: DocumentSource>(
    documents: &D,
    upload: &Upload,
    params: &ExportParams<'_>,
    definition_tx: Sender<RankingDefinition>,
    reference_tx: Sender<RankingReference>,
) -> Result<Vec<String>> {
    let cancel: &Cancellation = params.cancel;
    let mut extractor = DocumentExtractor::new(upload, &params.opts.skip_prefix);

    let visited = documents.insert_definitions_and_references_for_document(
        upload,
        params.graph_key,
        params.read_batch_size,
        &mut |document: &Document| {
            cancel.check()?;
            extractor.extract_document(
                document,
                |d| send_or_cancel(&definition_tx, d, cancel, "definition"),
                |r| send_or_cancel(&reference_tx, r, cancel, "reference"),
            )
        },
    );

    match visited {
        Ok(n) => {
            log::debug!("upload {}: extracted {} documents", upload.id, n);
            Ok(extractor.into_paths())
        }
        Err(e) if is_benign(&e) || is_queue_closed(&e) => Err(e),
        Err(e) => {
            log::error!(
                "failed to extract upload {} (repository {}, root {:?}): {:#}",
                upload.id,
                upload.repository_name,
                upload.root,
                e
            );
            Err(e)
        }
    }
}
