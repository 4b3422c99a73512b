//! Schema migrations for the SQLite backend.
//!
//! Migrations are tracked through SQLite's `user_version` pragma by
//! `rusqlite_migration` and embedded with `include_str!`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!(
        "migrations/001_initial_schema.sql"
    ))])
}

/// Opens (or creates) the database at `path` and brings it to the latest
/// schema.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    prepare(&mut conn)?;
    Ok(conn)
}

/// Opens a private in-memory database at the latest schema.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    prepare(&mut conn)?;
    Ok(conn)
}

fn prepare(conn: &mut Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Element rows cascade with their document.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))
}
