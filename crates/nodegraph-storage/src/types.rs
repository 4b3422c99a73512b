//! Storage-layer types for document identity and metadata.
//!
//! [`DocumentId`] is defined here (not in nodegraph-core) because document
//! identity is a storage concern: graphs only gain an ID when persisted.

use std::fmt;

use nodegraph_core::id::Guid;
use serde::{Deserialize, Serialize};

/// Unique identifier for a stored document.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

/// Summary of a stored document (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub name: String,
    /// GUID of the graph the document holds.
    pub graph: Guid,
    pub element_count: usize,
}
