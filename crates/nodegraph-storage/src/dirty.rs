//! Region-level change detection between a load and a later save.
//!
//! A save is compared against the fingerprints taken when the document was
//! loaded. An element whose stored bytes hash the same is clean, so an
//! untouched placeholder never shows up as dirty.

use std::collections::{HashMap, HashSet};

use nodegraph_core::id::Guid;

use crate::document::StoredDocument;
use crate::hash::fingerprint_document;

/// Elements that differ between two versions of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRegions {
    /// Elements with no previous fingerprint.
    pub added: HashSet<Guid>,
    /// Elements whose stored bytes changed.
    pub modified: HashSet<Guid>,
    /// Elements present before but gone now.
    pub removed: HashSet<Guid>,
}

impl DirtyRegions {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Elements that have to be rewritten (added + modified).
    pub fn needs_write(&self) -> HashSet<Guid> {
        self.added.union(&self.modified).copied().collect()
    }
}

/// Compares `document` against fingerprints from an earlier load.
pub fn compute_dirty_regions(
    document: &StoredDocument,
    previous: &HashMap<Guid, blake3::Hash>,
) -> DirtyRegions {
    let current = fingerprint_document(document);
    let mut regions = DirtyRegions::default();

    for (guid, hash) in &current {
        match previous.get(guid) {
            None => {
                regions.added.insert(*guid);
            }
            Some(old) if old != hash => {
                regions.modified.insert(*guid);
            }
            Some(_) => {}
        }
    }
    regions.removed = previous
        .keys()
        .filter(|guid| !current.contains_key(guid))
        .copied()
        .collect();
    regions
}
