//! SQLite connection pooling.
//!
//! The dashboard is read-heavy: every connected client refetches the
//! triage listing as events arrive, while writes trickle in one
//! question or answer at a time. WAL mode fits that shape — readers
//! proceed alongside the single writer — so every connection is put
//! into WAL, with foreign keys and a busy timeout, before the pool
//! hands it out.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// A pooled SQLite connection handle.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection tunables, mirrored by the `[database]` section of the
/// server config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database before failing,
    /// in milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on pooled connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Applies the per-connection pragmas.
///
/// Journal mode is verified rather than assumed: in-memory databases
/// report "memory" (acceptable), anything else that is not "wal" means
/// the database cannot serve concurrent readers and the connection is
/// rejected. Synchronous is relaxed to NORMAL, which WAL requires only
/// at checkpoint boundaries.
fn configure_connection(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    match journal_mode.as_str() {
        "wal" | "memory" => {}
        other => {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("unsupported journal mode: {other}")),
            ));
        }
    }

    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}

/// Creates the SQLite connection pool for the dashboard.
///
/// `db_path` may be `:memory:`, but each pooled connection then gets
/// its own private database; tests that share a pool should use a temp
/// file instead.
///
/// # Errors
///
/// Returns [`PoolError::PoolInit`] if the pool cannot be created.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| configure_connection(conn, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma<T: rusqlite::types::FromSql>(conn: &Connection, name: &str) -> T {
        conn.query_row(&format!("PRAGMA {name};"), [], |row| row.get(0))
            .expect("pragma query should succeed")
    }

    #[test]
    fn file_backed_pool_runs_wal() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("podium.db");

        let pool = create_pool(
            path.to_str().expect("utf-8 temp path"),
            DbRuntimeSettings::default(),
        )
        .expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        assert_eq!(pragma::<String>(&conn, "journal_mode"), "wal");
        // 1 = NORMAL
        assert_eq!(pragma::<i64>(&conn, "synchronous"), 1);
        assert_eq!(pragma::<i64>(&conn, "foreign_keys"), 1);
    }

    #[test]
    fn settings_reach_every_connection() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
        };

        let pool = create_pool(":memory:", settings).expect("pool creation should succeed");
        assert_eq!(pool.max_size(), 3);

        let conn = pool.get().expect("should get a connection");
        assert_eq!(pragma::<i64>(&conn, "busy_timeout"), 2_500);
        // In-memory databases report "memory" instead of "wal".
        assert_eq!(pragma::<String>(&conn, "journal_mode"), "memory");
        assert_eq!(pragma::<i64>(&conn, "foreign_keys"), 1);
    }
}
