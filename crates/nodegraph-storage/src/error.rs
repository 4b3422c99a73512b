//! Storage error types for nodegraph-storage.
//!
//! [`StorageError`] covers I/O, serialization, database and lookup failures.
//! Unresolved element types are not errors here: loading degrades them to
//! placeholders and lists them in the load report.

use nodegraph_core::id::Guid;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a document file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A document with the given ID was not found.
    #[error("document not found: {0}")]
    DocumentNotFound(i64),

    /// An element was not found in the given document.
    #[error("element not found: document={document}, element={guid}")]
    ElementNotFound { document: i64, guid: Guid },

    /// The stored document uses a format this build does not read.
    #[error("unsupported document format version {version}")]
    UnsupportedFormat { version: u32 },

    /// A retained placeholder payload is not valid JSON text.
    #[error("invalid payload for element {guid}: {reason}")]
    InvalidPayload { guid: Guid, reason: String },

    /// A stored row could not be turned back into a document element.
    #[error("invalid stored row: {reason}")]
    InvalidRow { reason: String },
}
