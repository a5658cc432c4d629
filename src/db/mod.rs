mod from_row;
pub mod queries;
mod schema;

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::ai::Assistant;
use crate::error::Result;
use crate::realtime::EventBus;
use crate::storage::Storage;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub events: EventBus,
    pub storage: Storage,
    /// None when no AI key is configured
    pub assistant: Option<Assistant>,
}

/// Open a pooled SQLite database at `path` with foreign keys enforced.
pub fn create_pool(path: impl AsRef<Path>) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::SCHEMA)?;
    Ok(())
}
