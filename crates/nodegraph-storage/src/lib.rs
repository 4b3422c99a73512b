//! Storage for graph documents.
//!
//! Provides the [`DocumentStore`] trait plus [`InMemoryStore`] and
//! [`SqliteStore`] backends. Loading goes through a two-pass
//! [`recompose`](convert::recompose) that degrades elements of unknown or
//! incompatible type to placeholders instead of failing; saving writes those
//! placeholders' payloads back byte for byte.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: DocumentId, DocumentSummary
//! - [`document`]: the stored document format
//! - [`convert`]: GraphModel decompose/recompose and the load report
//! - [`hash`]: blake3 fingerprints of stored elements
//! - [`dirty`]: change detection against a previous load
//! - [`traits`]: DocumentStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQLite migrations
//! - [`sqlite`]: SqliteStore implementation

pub mod convert;
pub mod dirty;
pub mod document;
pub mod error;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use convert::{decompose, recompose, LoadAnomaly, LoadReport, LoadedDocument, ReferenceKind};
pub use dirty::{compute_dirty_regions, DirtyRegions};
pub use document::{StoredDocument, StoredElement, FORMAT_VERSION};
pub use error::StorageError;
pub use hash::{fingerprint_document, hash_document, hash_element};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::DocumentStore;
pub use types::{DocumentId, DocumentSummary};
