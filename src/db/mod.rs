// Database layer: the generic record store the engine reads and writes.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever PRESTIGE_DB_PATH points
// (defaults to ./prestige.db).

pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use models::{Filter, Record, SubjectRef, SubjectType, Table};
pub use sqlite::SqliteStore;
pub use traits::RecordStore;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database and run migrations.
///
/// Called by `prestige init` and by any command that needs the store.
pub fn initialize(db_path: &str) -> Result<Arc<dyn RecordStore>> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // WAL lets readers proceed while a toggle is writing
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(Arc::new(SqliteStore::new(conn)))
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Arc<dyn RecordStore>> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `prestige init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Pick up migrations added since the file was created
    schema::create_tables(&conn)?;

    Ok(Arc::new(SqliteStore::new(conn)))
}
