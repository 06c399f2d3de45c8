//! Persistence for the local quote collection.
//!
//! The store is mirrored to a small key-value table in SQLite. Each slot holds
//! a JSON document:
//! - `quotes`: the ordered quote collection
//! - `last_sync`: Unix milliseconds of the last completed sync
//! - `conflicts`: the unresolved conflict queue

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::QuoteResult;
use crate::models::{ConflictEntry, Quote};

const QUOTES_KEY: &str = "quotes";
const LAST_SYNC_KEY: &str = "last_sync";
const CONFLICTS_KEY: &str = "conflicts";

/// Durable storage for the local store and conflict queue.
///
/// `None` from a `load*` method means the slot has never been written.
pub trait Persistence: Send {
    fn load(&self) -> QuoteResult<Option<Vec<Quote>>>;
    fn save(&self, quotes: &[Quote]) -> QuoteResult<()>;
    fn load_timestamp(&self) -> QuoteResult<Option<i64>>;
    fn save_timestamp(&self, timestamp: i64) -> QuoteResult<()>;
    fn load_conflicts(&self) -> QuoteResult<Option<Vec<ConflictEntry>>>;
    fn save_conflicts(&self, conflicts: &[ConflictEntry]) -> QuoteResult<()>;
}

/// SQLite-backed key-value persistence
pub struct SqlitePersistence {
    conn: Connection,
}

impl SqlitePersistence {
    /// Open (or create) a database file
    pub fn new<P: AsRef<Path>>(db_path: P) -> QuoteResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL so readers in other processes see a consistent snapshot
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self { conn };
        db.init_database()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> QuoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_database()?;
        Ok(db)
    }

    fn init_database(&self) -> QuoteResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn get_slot(&self, key: &str) -> QuoteResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set_slot(&self, key: &str, value: &str) -> QuoteResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove every slot
    pub fn clear(&self) -> QuoteResult<()> {
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

impl Persistence for SqlitePersistence {
    fn load(&self) -> QuoteResult<Option<Vec<Quote>>> {
        match self.get_slot(QUOTES_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, quotes: &[Quote]) -> QuoteResult<()> {
        let json = serde_json::to_string(quotes)?;
        self.set_slot(QUOTES_KEY, &json)
    }

    fn load_timestamp(&self) -> QuoteResult<Option<i64>> {
        match self.get_slot(LAST_SYNC_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_timestamp(&self, timestamp: i64) -> QuoteResult<()> {
        self.set_slot(LAST_SYNC_KEY, &timestamp.to_string())
    }

    fn load_conflicts(&self) -> QuoteResult<Option<Vec<ConflictEntry>>> {
        match self.get_slot(CONFLICTS_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_conflicts(&self, conflicts: &[ConflictEntry]) -> QuoteResult<()> {
        let json = serde_json::to_string(conflicts)?;
        self.set_slot(CONFLICTS_KEY, &json)
    }
}
