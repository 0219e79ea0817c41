// src/store/mod.rs — Storage manager

pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use store::{AccountRow, DebitAttempt, LedgerEntryRow, SessionRow, Store};

/// Shared handle to the store. Lock scope is one statement or one short
/// transaction; never held across an await point.
pub type SharedStore = Arc<Mutex<Store>>;

/// Open (or create) the database at the given path.
pub fn open(path: &Path) -> anyhow::Result<SharedStore> {
    let conn = Connection::open(path)?;
    // Enable WAL mode for better concurrent performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    schema::run_migrations(&conn)?;

    Ok(Arc::new(Mutex::new(Store::new(conn))))
}

/// Create an in-memory database (for testing).
pub fn in_memory() -> anyhow::Result<SharedStore> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    schema::run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(Store::new(conn))))
}
