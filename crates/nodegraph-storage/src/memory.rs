//! In-memory implementation of [`DocumentStore`].
//!
//! Documents live in a `HashMap` keyed by id. Useful for tests and for
//! sessions that never touch disk.

use std::collections::HashMap;

use nodegraph_core::id::Guid;

use crate::document::{StoredDocument, StoredElement};
use crate::error::StorageError;
use crate::traits::DocumentStore;
use crate::types::{DocumentId, DocumentSummary};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: HashMap<i64, StoredDocument>,
    next_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            documents: HashMap::new(),
            next_id: 1,
        }
    }

    fn document(&self, id: DocumentId) -> Result<&StoredDocument, StorageError> {
        self.documents
            .get(&id.0)
            .ok_or(StorageError::DocumentNotFound(id.0))
    }

    fn document_mut(&mut self, id: DocumentId) -> Result<&mut StoredDocument, StorageError> {
        self.documents
            .get_mut(&id.0)
            .ok_or(StorageError::DocumentNotFound(id.0))
    }
}

impl DocumentStore for InMemoryStore {
    fn create_document(&mut self, name: &str) -> Result<DocumentId, StorageError> {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.documents
            .insert(id, StoredDocument::empty(Guid::generate(), name));
        Ok(DocumentId(id))
    }

    fn save_document(
        &mut self,
        id: DocumentId,
        document: &StoredDocument,
    ) -> Result<(), StorageError> {
        *self.document_mut(id)? = document.clone();
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> Result<StoredDocument, StorageError> {
        self.document(id).cloned()
    }

    fn delete_document(&mut self, id: DocumentId) -> Result<(), StorageError> {
        self.documents
            .remove(&id.0)
            .map(|_| ())
            .ok_or(StorageError::DocumentNotFound(id.0))
    }

    fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        let mut summaries: Vec<_> = self
            .documents
            .iter()
            .map(|(id, document)| DocumentSummary {
                id: DocumentId(*id),
                name: document.name.clone(),
                graph: document.graph,
                element_count: document.elements.len(),
            })
            .collect();
        summaries.sort_by_key(|s| s.id.0);
        Ok(summaries)
    }

    fn get_element(&self, id: DocumentId, guid: Guid) -> Result<StoredElement, StorageError> {
        self.document(id)?
            .element(guid)
            .cloned()
            .ok_or(StorageError::ElementNotFound {
                document: id.0,
                guid,
            })
    }

    fn update_element(
        &mut self,
        id: DocumentId,
        element: &StoredElement,
    ) -> Result<(), StorageError> {
        let document = self.document_mut(id)?;
        let slot = document
            .elements
            .iter_mut()
            .find(|e| e.guid == element.guid)
            .ok_or(StorageError::ElementNotFound {
                document: id.0,
                guid: element.guid,
            })?;
        let reference_id = slot.reference_id;
        *slot = element.clone();
        slot.reference_id = reference_id;
        Ok(())
    }
}
