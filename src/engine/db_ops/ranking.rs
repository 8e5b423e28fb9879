//! SQLite ranking store: upload selection, append-only graph rows, vacuum.

use anyhow::{Context, Result};
use rusqlite::{Connection, Statement, params};
use std::path::Path;
use std::sync::Mutex;

use crate::pipeline::RankingStore;
use crate::utils::config::COMPLETED_STATE;
use crate::{RankingDefinition, RankingReference, Upload};

use super::{
    INSERT_DEFINITION_SQL, INSERT_INITIAL_PATH_RANK_SQL, INSERT_REFERENCE_SQL, RANKING_SCHEMA,
    lock_conn, open_db, open_db_in_memory, with_transaction,
};

/// Ranking store over one SQLite connection. Shared by reference across writer threads.
pub struct SqliteRankingStore {
    conn: Mutex<Connection>,
}

impl SqliteRankingStore {
    pub fn open(path: &Path, passphrase: Option<&str>) -> Result<Self> {
        let conn = open_db(path, RANKING_SCHEMA, passphrase)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = open_db_in_memory(RANKING_SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Register an upload (loaders and tests). `state` other than `completed` is never exported.
    pub fn insert_upload(&self, upload: &Upload, state: &str) -> Result<()> {
        lock_conn(&self.conn)?
            .execute(
                "INSERT OR REPLACE INTO uploads (id, repository_id, repository_name, root, state) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    upload.id,
                    upload.repository_id,
                    upload.repository_name,
                    upload.root,
                    state
                ],
            )
            .context("insert upload")?;
        Ok(())
    }

    pub fn set_upload_state(&self, upload_id: i64, state: &str) -> Result<()> {
        lock_conn(&self.conn)?
            .execute(
                "UPDATE uploads SET state = ?1 WHERE id = ?2",
                params![state, upload_id],
            )
            .context("update upload state")?;
        Ok(())
    }

    /// All definition rows of `graph_key`, in insertion order.
    pub fn definitions(&self, graph_key: &str) -> Result<Vec<RankingDefinition>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT upload_id, symbol_name, document_path FROM ranking_definitions WHERE graph_key = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([graph_key], |row| {
            Ok(RankingDefinition {
                upload_id: row.get(0)?,
                symbol_name: row.get(1)?,
                document_path: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("load definitions")
    }

    /// All reference rows of `graph_key`, in insertion order.
    pub fn references(&self, graph_key: &str) -> Result<Vec<RankingReference>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT upload_id, symbol_name FROM ranking_references WHERE graph_key = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([graph_key], |row| {
            Ok(RankingReference {
                upload_id: row.get(0)?,
                symbol_name: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("load references")
    }

    /// All `(upload_id, document_path)` seed rows of `graph_key`, sorted.
    pub fn initial_path_ranks(&self, graph_key: &str) -> Result<Vec<(i64, String)>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT upload_id, document_path FROM ranking_initial_path_ranks WHERE graph_key = ?1 ORDER BY upload_id, document_path",
        )?;
        let rows = stmt.query_map([graph_key], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("load initial path ranks")
    }

    /// Upload ids recorded as exported under `graph_key`, sorted.
    pub fn exported_upload_ids(&self, graph_key: &str) -> Result<Vec<i64>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT upload_id FROM ranking_exports WHERE graph_key = ?1 ORDER BY upload_id",
        )?;
        let rows = stmt.query_map([graph_key], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("load exported uploads")
    }

    fn vacuum_table(&self, table: &str, graph_key: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {table} WHERE graph_key = ?1 AND upload_id NOT IN (SELECT id FROM uploads WHERE state = ?2)"
        );
        lock_conn(&self.conn)?
            .execute(&sql, params![graph_key, COMPLETED_STATE])
            .with_context(|| format!("vacuum {table}"))
    }
}

/// Execute `insert` once per item, `batch_size` items at a time. Outside an enclosing transaction
/// each batch commits on its own; inside one, batches join it.
fn insert_in_batches<I>(
    conn: &Connection,
    sql: &str,
    items: &[I],
    batch_size: usize,
    mut insert: impl FnMut(&mut Statement<'_>, &I) -> rusqlite::Result<usize>,
) -> Result<()> {
    for chunk in items.chunks(batch_size.max(1)) {
        let tx = if conn.is_autocommit() {
            Some(conn.unchecked_transaction().context("begin transaction")?)
        } else {
            None
        };
        {
            let mut stmt = conn.prepare_cached(sql).context("prepare insert")?;
            for item in chunk {
                insert(&mut stmt, item).context("insert row")?;
            }
        }
        if let Some(tx) = tx {
            tx.commit().context("commit transaction")?;
        }
    }
    Ok(())
}

impl RankingStore for SqliteRankingStore {
    fn get_uploads_for_ranking(&self, graph_key: &str, batch_size: usize) -> Result<Vec<Upload>> {
        let conn = lock_conn(&self.conn)?;
        let uploads = {
            let mut stmt = conn.prepare(
                r#"
                SELECT u.id, u.repository_id, u.repository_name, u.root
                FROM uploads u
                WHERE u.state = ?1
                  AND NOT EXISTS (
                      SELECT 1 FROM ranking_exports e
                      WHERE e.upload_id = u.id AND e.graph_key = ?2
                  )
                ORDER BY u.id
                LIMIT ?3
                "#,
            )?;
            let rows = stmt.query_map(
                params![COMPLETED_STATE, graph_key, batch_size as i64],
                |row| {
                    Ok(Upload {
                        id: row.get(0)?,
                        repository_id: row.get(1)?,
                        repository_name: row.get(2)?,
                        root: row.get(3)?,
                    })
                },
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("select uploads for ranking")?
        };

        let mut mark = conn
            .prepare_cached(
                "INSERT OR IGNORE INTO ranking_exports (upload_id, graph_key) VALUES (?1, ?2)",
            )
            .context("prepare export mark")?;
        for upload in &uploads {
            mark.execute(params![upload.id, graph_key])
                .context("mark upload exported")?;
        }
        Ok(uploads)
    }

    fn insert_definitions_for_ranking(
        &self,
        graph_key: &str,
        definitions: &[RankingDefinition],
    ) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        insert_in_batches(
            &conn,
            INSERT_DEFINITION_SQL,
            definitions,
            definitions.len(),
            |stmt, d| stmt.execute(params![d.upload_id, d.symbol_name, d.document_path, graph_key]),
        )
    }

    fn insert_references_for_ranking(
        &self,
        graph_key: &str,
        batch_size: usize,
        upload_id: i64,
        symbol_names: &[String],
    ) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        insert_in_batches(
            &conn,
            INSERT_REFERENCE_SQL,
            symbol_names,
            batch_size,
            |stmt, name| stmt.execute(params![upload_id, name, graph_key]),
        )
    }

    fn insert_initial_path_ranks(
        &self,
        upload_id: i64,
        document_paths: &[String],
        batch_size: usize,
        graph_key: &str,
    ) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        insert_in_batches(
            &conn,
            INSERT_INITIAL_PATH_RANK_SQL,
            document_paths,
            batch_size,
            |stmt, path| stmt.execute(params![upload_id, path, graph_key]),
        )
    }

    fn vacuum_stale_definitions(&self, graph_key: &str) -> Result<usize> {
        self.vacuum_table("ranking_definitions", graph_key)
    }

    fn vacuum_stale_references(&self, graph_key: &str) -> Result<usize> {
        self.vacuum_table("ranking_references", graph_key)
    }

    fn vacuum_stale_initial_paths(&self, graph_key: &str) -> Result<usize> {
        self.vacuum_table("ranking_initial_path_ranks", graph_key)
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        with_transaction(&self.conn, f)
    }
}
