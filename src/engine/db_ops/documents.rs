//! SQLite document store: documents keyed by (upload, path), ranges stored with the range codec.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::codec::{decode_flattened_ranges, encode_ranges};
use crate::pipeline::DocumentSource;
use crate::{Document, Occurrence, Upload};

use super::{DOCUMENTS_SCHEMA, lock_conn, open_db, open_db_in_memory, with_transaction};

/// Symbol half of a stored occurrence; the range half lives in the `ranges` column.
#[derive(Serialize, Deserialize)]
struct StoredSymbol {
    symbol: String,
    roles: u32,
}

/// One raw `documents` row.
struct StoredDocument {
    path: String,
    symbols: String,
    ranges: Vec<u8>,
}

/// Document store over one SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path, passphrase: Option<&str>) -> Result<Self> {
        let conn = open_db(path, DOCUMENTS_SCHEMA, passphrase)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = open_db_in_memory(DOCUMENTS_SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Store (or replace) `document` for `upload_id`.
    pub fn insert_document(&self, upload_id: i64, document: &Document) -> Result<()> {
        let symbols: Vec<StoredSymbol> = document
            .occurrences
            .iter()
            .map(|o| StoredSymbol {
                symbol: o.symbol.clone(),
                roles: o.symbol_roles,
            })
            .collect();
        let flat: Vec<i32> = document
            .occurrences
            .iter()
            .flat_map(|o| o.range)
            .collect();
        let symbols = serde_json::to_string(&symbols).context("serialize symbols")?;
        let ranges = encode_ranges(&flat).context("encode ranges")?;

        lock_conn(&self.conn)?
            .execute(
                "INSERT OR REPLACE INTO documents (upload_id, path, symbols, ranges) VALUES (?1, ?2, ?3, ?4)",
                params![upload_id, document.path, symbols, ranges],
            )
            .context("insert document")?;
        Ok(())
    }

    /// Next page of rows after `after_path` (keyset pagination on path). Lock is held only for the read.
    fn read_page(
        &self,
        upload_id: i64,
        after_path: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT path, symbols, ranges FROM documents WHERE upload_id = ?1 AND (?2 IS NULL OR path > ?2) ORDER BY path LIMIT ?3",
            )
            .context("prepare document page")?;
        let rows = stmt.query_map(params![upload_id, after_path, limit as i64], |row| {
            Ok(StoredDocument {
                path: row.get(0)?,
                symbols: row.get(1)?,
                ranges: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read document page")
    }
}

/// Join the symbol payload and the codec-encoded ranges back into a [`Document`].
fn decode_document(row: StoredDocument) -> Result<Document> {
    let symbols: Vec<StoredSymbol> =
        serde_json::from_str(&row.symbols).context("parse symbols")?;
    let flat = decode_flattened_ranges(&row.ranges).context("decode ranges")?;
    if flat.len() != symbols.len() * 4 {
        bail!(
            "{} symbols but {} ranges",
            symbols.len(),
            flat.len() / 4
        );
    }
    let occurrences = symbols
        .into_iter()
        .zip(flat.chunks_exact(4))
        .map(|(s, q)| Occurrence {
            symbol: s.symbol,
            symbol_roles: s.roles,
            range: [q[0], q[1], q[2], q[3]],
        })
        .collect();
    Ok(Document {
        path: row.path,
        occurrences,
    })
}

impl DocumentSource for SqliteDocumentStore {
    fn insert_definitions_and_references_for_document(
        &self,
        upload: &Upload,
        graph_key: &str,
        batch_size: usize,
        on_document: &mut dyn FnMut(&Document) -> Result<()>,
    ) -> Result<usize> {
        let limit = batch_size.max(1);
        let mut after: Option<String> = None;
        let mut visited = 0_usize;
        loop {
            let page = self.read_page(upload.id, after.as_deref(), limit)?;
            let page_len = page.len();
            for row in page {
                after = Some(row.path.clone());
                let path = row.path.clone();
                let document = decode_document(row).with_context(|| {
                    format!("decode document {} of upload {}", path, upload.id)
                })?;
                on_document(&document)?;
                visited += 1;
            }
            if page_len < limit {
                break;
            }
        }
        log::debug!(
            "upload {}: visited {} documents for graph key {}",
            upload.id,
            visited,
            graph_key
        );
        Ok(visited)
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        with_transaction(&self.conn, f)
    }
}
