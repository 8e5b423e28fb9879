//! Open databases and run transactions over a shared connection.

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::WAL_PRAGMAS;

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection, schema: &str) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(schema).context("create schema")?;
    Ok(())
}

/// Open or create a database and ensure `schema` + WAL.
/// If `passphrase` is Some, set SQLCipher PRAGMA key before any other operations.
pub fn open_db(path: &Path, schema: &str, passphrase: Option<&str>) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open database {}", path.display()))?;

    if let Some(key) = passphrase {
        conn.pragma_update(None, "key", key)
            .context("set SQLCipher key")?;
    }

    apply_wal_and_schema(&conn, schema)?;
    Ok(conn)
}

/// Open an in-memory database with `schema` (tests and throwaway runs; no WAL pragmas needed).
pub fn open_db_in_memory(schema: &str) -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(schema).context("create schema")?;
    Ok(conn)
}

pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("database connection mutex poisoned"))
}

const SAVEPOINT: &str = concat!(env!("CARGO_PKG_NAME"), "_nested");

/// Run `f` inside a transaction on `conn`: `BEGIN IMMEDIATE` at the top level, a SAVEPOINT when a
/// transaction is already open. Commits when `f` returns Ok, rolls back otherwise.
///
/// The lock is released while `f` runs so store calls made by `f` (from any thread) can take it.
pub(crate) fn with_transaction<T, F>(conn: &Mutex<Connection>, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let nested = !lock_conn(conn)?.is_autocommit();
    let (begin, commit, rollback) = if nested {
        (
            format!("SAVEPOINT {SAVEPOINT}"),
            format!("RELEASE {SAVEPOINT}"),
            format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"),
        )
    } else {
        (
            "BEGIN IMMEDIATE".to_string(),
            "COMMIT".to_string(),
            "ROLLBACK".to_string(),
        )
    };

    lock_conn(conn)?
        .execute_batch(&begin)
        .context("begin transaction")?;

    let result = f().and_then(|value| {
        lock_conn(conn)?
            .execute_batch(&commit)
            .context("commit transaction")?;
        Ok(value)
    });

    if result.is_err() {
        let guard = lock_conn(conn)?;
        // A failed COMMIT may already have ended the transaction.
        if !guard.is_autocommit()
            && let Err(e) = guard.execute_batch(&rollback)
        {
            log::warn!("rollback failed: {}", e);
        }
    }
    result
}
