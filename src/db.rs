//! SQLite connection setup shared by the stores.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Open a file-backed database. Several stores may point at the same file,
/// each with its own connection.
pub fn open<P: AsRef<Path>>(path: P) -> Result<SharedConnection> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn open_in_memory() -> Result<SharedConnection> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// True when `err` was caused by a UNIQUE or PRIMARY KEY constraint failing.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    })
}
