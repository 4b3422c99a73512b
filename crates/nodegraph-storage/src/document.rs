//! The stored document format.
//!
//! A document is a JSON object listing its elements in document order. Each
//! element row carries the type identifier, structural category, GUID and
//! load-session reference id next to an opaque `payload`. Payloads are kept
//! as [`RawValue`]s so that a placeholder's bytes pass through a load/save
//! cycle untouched.
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "graph": "6f1c...",
//!   "name": "main",
//!   "elements": [
//!     { "type": "Math.Add", "category": "Node", "guid": "...", "reference_id": 0,
//!       "payload": { "node": { "title": "Add" } } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use nodegraph_core::element::ElementCategory;
use nodegraph_core::id::{Guid, ReferenceId};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::StorageError;

/// Current document format version.
pub const FORMAT_VERSION: u32 = 1;

/// One stored element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredElement {
    #[serde(rename = "type")]
    pub type_name: String,
    pub category: ElementCategory,
    pub guid: Guid,
    pub reference_id: ReferenceId,
    pub payload: Box<RawValue>,
}

impl StoredElement {
    /// Raw payload bytes exactly as stored.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.get().as_bytes()
    }
}

/// A whole stored graph document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub format_version: u32,
    pub graph: Guid,
    pub name: String,
    pub elements: Vec<StoredElement>,
}

impl StoredDocument {
    /// An empty document for a new graph.
    pub fn empty(graph: Guid, name: &str) -> Self {
        StoredDocument {
            format_version: FORMAT_VERSION,
            graph,
            name: name.to_string(),
            elements: Vec::new(),
        }
    }

    /// Parses a document, rejecting unknown format versions.
    pub fn from_json(text: &str) -> Result<Self, StorageError> {
        let document: StoredDocument = serde_json::from_str(text)?;
        if document.format_version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                version: document.format_version,
            });
        }
        Ok(document)
    }

    /// Serializes the document in its canonical pretty-printed form.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_from(path: &Path) -> Result<Self, StorageError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), StorageError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn element(&self, guid: Guid) -> Option<&StoredElement> {
        self.elements.iter().find(|e| e.guid == guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
  "format_version": 1,
  "graph": "00000000-0000-0000-0000-000000000064",
  "name": "main",
  "elements": [
    {
      "type": "Legacy.Node",
      "category": "Node",
      "guid": "00000000-0000-0000-0000-000000000001",
      "reference_id": 0,
      "payload": {"legacy":  [1, 2,3], "keep": "spacing"}
    }
  ]
}"#;

    #[test]
    fn payload_is_kept_verbatim() {
        let document = StoredDocument::from_json(DOC).unwrap();
        assert_eq!(
            document.elements[0].payload.get(),
            r#"{"legacy":  [1, 2,3], "keep": "spacing"}"#
        );
        assert_eq!(document.to_json().unwrap(), DOC);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let text = DOC.replace("\"format_version\": 1", "\"format_version\": 9");
        assert!(matches!(
            StoredDocument::from_json(&text),
            Err(StorageError::UnsupportedFormat { version: 9 })
        ));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.graph.json");
        let document = StoredDocument::from_json(DOC).unwrap();
        document.write_to(&path).unwrap();
        let back = StoredDocument::read_from(&path).unwrap();
        assert_eq!(back.to_json().unwrap(), DOC);
    }
}
