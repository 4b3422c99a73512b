//! The [`DocumentStore`] trait defining the storage contract for graph
//! documents.
//!
//! Backends implement document-level CRUD plus single-element reads and
//! updates. Graph-level save and load are provided on top of those through
//! [`decompose`] and [`recompose`], so every backend loads with the same
//! placeholder degradation and writes placeholder payloads back verbatim.

use std::collections::HashMap;

use nodegraph_core::graph::GraphModel;
use nodegraph_core::id::Guid;
use nodegraph_core::type_registry::TypeRegistry;
use tracing::debug;

use crate::convert::{decompose, recompose, LoadedDocument};
use crate::dirty::{compute_dirty_regions, DirtyRegions};
use crate::document::{StoredDocument, StoredElement};
use crate::error::StorageError;
use crate::types::{DocumentId, DocumentSummary};

/// The storage contract for graph documents.
///
/// Synchronous; a store is owned by one editing session at a time.
pub trait DocumentStore {
    // -------------------------------------------------------------------
    // Document-level operations
    // -------------------------------------------------------------------

    /// Creates a new empty document holding a fresh graph.
    fn create_document(&mut self, name: &str) -> Result<DocumentId, StorageError>;

    /// Replaces the whole stored content of a document.
    fn save_document(
        &mut self,
        id: DocumentId,
        document: &StoredDocument,
    ) -> Result<(), StorageError>;

    /// Reads a document back exactly as stored.
    fn load_document(&self, id: DocumentId) -> Result<StoredDocument, StorageError>;

    fn delete_document(&mut self, id: DocumentId) -> Result<(), StorageError>;

    fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError>;

    // -------------------------------------------------------------------
    // Element-level operations (incremental save)
    // -------------------------------------------------------------------

    fn get_element(
        &self,
        id: DocumentId,
        guid: Guid,
    ) -> Result<StoredElement, StorageError>;

    /// Rewrites one element row in place, keeping its document position.
    fn update_element(
        &mut self,
        id: DocumentId,
        element: &StoredElement,
    ) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Graph-level convenience methods
    // -------------------------------------------------------------------

    /// Decomposes `graph` and stores it as the whole document.
    fn save_graph(&mut self, id: DocumentId, graph: &GraphModel) -> Result<(), StorageError> {
        let document = decompose(graph)?;
        self.save_document(id, &document)
    }

    /// Loads a document and recomposes it against `registry`.
    fn load_graph(
        &self,
        id: DocumentId,
        registry: &TypeRegistry,
    ) -> Result<LoadedDocument, StorageError> {
        let document = self.load_document(id)?;
        Ok(recompose(&document, registry))
    }

    /// Saves only what changed since the load that produced `previous`.
    ///
    /// Modified elements are updated row by row. Added or removed elements
    /// shift document positions, so those fall back to a full save.
    fn save_changes(
        &mut self,
        id: DocumentId,
        graph: &GraphModel,
        previous: &HashMap<Guid, blake3::Hash>,
    ) -> Result<DirtyRegions, StorageError> {
        let document = decompose(graph)?;
        let regions = compute_dirty_regions(&document, previous);
        if regions.is_clean() {
            debug!(document = %id, "no changes to save");
        } else if regions.added.is_empty() && regions.removed.is_empty() {
            for element in document
                .elements
                .iter()
                .filter(|e| regions.modified.contains(&e.guid))
            {
                self.update_element(id, element)?;
            }
            debug!(document = %id, modified = regions.modified.len(), "saved modified elements");
        } else {
            self.save_document(id, &document)?;
            debug!(document = %id, changed = regions.total(), "saved whole document");
        }
        Ok(regions)
    }
}
