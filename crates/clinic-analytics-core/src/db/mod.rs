//! Document store for cached analytics.
//!
//! The store holds key-value documents under a per-document size ceiling.
//! Every operation is atomic on a single document; nothing spans documents.

mod documents;
mod schema;

pub use schema::*;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

/// Default per-document ceiling (1 MiB), matching hosted document stores.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1_048_576;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document {id} is {size} bytes, over the {limit} byte limit")]
    DocumentTooLarge { id: String, size: usize, limit: usize },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(e.to_string())
    }
}

/// Key-value document store with a per-document size ceiling.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document body by ID.
    fn get_document(&self, id: &str) -> StoreResult<Option<String>>;

    /// Create or replace a document. Fails if the body exceeds the ceiling.
    fn put_document(&self, id: &str, body: &str) -> StoreResult<()>;

    /// Delete a document. Returns whether it existed.
    fn delete_document(&self, id: &str) -> StoreResult<bool>;

    /// IDs starting with `prefix`, in ascending order.
    fn list_document_ids(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Per-document size ceiling in bytes.
    fn max_document_bytes(&self) -> usize;
}

/// SQLite-backed document store.
pub struct Database {
    conn: Mutex<Connection>,
    max_document_bytes: usize,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        };
        db.initialize()?;
        Ok(db)
    }

    /// Override the per-document ceiling.
    pub fn with_max_document_bytes(mut self, limit: usize) -> Self {
        self.max_document_bytes = limit;
        self
    }

    /// Initialize schema.
    fn initialize(&self) -> StoreResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get the raw connection (for advanced queries).
    pub fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }
}
