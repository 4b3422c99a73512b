//! Deterministic content hashing of stored elements using blake3.
//!
//! Fingerprints are derived state taken over the exact stored bytes, never
//! persisted. They let a save be compared region by region with what was
//! loaded, which is how untouched placeholder regions are proven unchanged.
//!
//! The reference id is positional and excluded from the element hash.

use std::collections::HashMap;

use nodegraph_core::id::Guid;

use crate::document::{StoredDocument, StoredElement};

/// Hash of one element: type identifier, category, GUID and payload bytes.
pub fn hash_element(element: &StoredElement) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    // Length prefixes keep adjacent fields from running together.
    hasher.update(&(element.type_name.len() as u64).to_le_bytes());
    hasher.update(element.type_name.as_bytes());
    hasher.update(element.category.as_str().as_bytes());
    hasher.update(element.guid.0.as_bytes());
    hasher.update(element.payload_bytes());
    hasher.finalize()
}

/// Per-element fingerprints of a document, keyed by GUID.
///
/// When a GUID appears twice the first occurrence wins, mirroring load.
pub fn fingerprint_document(document: &StoredDocument) -> HashMap<Guid, blake3::Hash> {
    let mut fingerprints = HashMap::new();
    for element in &document.elements {
        fingerprints
            .entry(element.guid)
            .or_insert_with(|| hash_element(element));
    }
    fingerprints
}

/// Root hash of a document: graph identity, name and element hashes in
/// document order.
pub fn hash_document(document: &StoredDocument) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(document.graph.0.as_bytes());
    hasher.update(&(document.name.len() as u64).to_le_bytes());
    hasher.update(document.name.as_bytes());
    for element in &document.elements {
        hasher.update(hash_element(element).as_bytes());
    }
    hasher.finalize()
}
