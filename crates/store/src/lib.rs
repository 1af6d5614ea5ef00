//! Embedded per-collection document store.
//!
//! Each collection is backed by a single append-only journal file on disk.
//! A line is either a full serialized document (insert or update) or a
//! tombstone marker `{"$$deleted": "<id>"}`. On open the journal is replayed
//! into an in-memory working set and then compacted, so the file shrinks
//! back to one line per live document.
//!
//! The store enforces unique indexes at the insert/update boundary — there
//! are no database-level constraints beyond that, and no cross-collection
//! referential integrity. Relationships between collections are a handler
//! concern.
//!
//! ## Concurrency
//!
//! A [`Collection`] is single-owner mutable state. Callers issue operations
//! sequentially; there are no locks and no transactions.

mod collection;

pub use collection::{Collection, CollectionOptions, Document};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Journal file I/O failed
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be serialized for the journal
    #[error("failed to serialize document: {0}")]
    Serialize(serde_json::Error),

    /// A journal line could not be deserialized
    #[error("failed to deserialize document: {0}")]
    Deserialize(serde_json::Error),

    /// An insert or update would violate a unique index
    #[error("unique index '{index}' violated by key '{key}'")]
    UniqueViolation { index: String, key: String },

    /// A document with the same id already exists
    #[error("duplicate document id: {0}")]
    DuplicateId(String),

    /// A lookup referenced an index that was never registered
    #[error("unknown index: {0}")]
    UnknownIndex(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
