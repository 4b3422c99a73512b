//! Type manifests: the JSON list of element types known to a session.
//!
//! ```json
//! { "types": [
//!     { "name": "Math.Add", "category": "Node", "aliases": ["Math.Plus"] },
//!     { "name": "Math.AddFloat", "category": "Node", "parent": "Math.Add" }
//! ] }
//! ```
//!
//! Entries may appear in any order; a type is registered once its parent is.

use std::fs;
use std::path::Path;

use nodegraph_core::element::ElementCategory;
use nodegraph_core::error::CoreError;
use nodegraph_core::type_registry::{TypeDescriptor, TypeRegistry};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read type manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed type manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid type manifest: {0}")]
    Registration(#[from] CoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub category: ElementCategory,
    #[serde(default)]
    pub parent: Option<String>,
    /// Former names of this type.
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeManifest {
    pub types: Vec<ManifestEntry>,
}

impl TypeManifest {
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn read_from(path: &Path) -> Result<Self, ManifestError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Builds a registry holding the built-in types plus every entry.
    pub fn into_registry(self) -> Result<TypeRegistry, ManifestError> {
        let mut registry = TypeRegistry::new();
        let mut pending = self.types;
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for entry in pending {
                let ready = entry
                    .parent
                    .as_deref()
                    .map_or(true, |parent| registry.resolve(parent).is_some());
                if ready {
                    register(&mut registry, entry)?;
                } else {
                    waiting.push(entry);
                }
            }
            if waiting.len() == before {
                // No progress: the first waiting entry names a missing parent.
                // Registering it reports the error.
                register(&mut registry, waiting.swap_remove(0))?;
            }
            pending = waiting;
        }
        Ok(registry)
    }
}

fn register(registry: &mut TypeRegistry, entry: ManifestEntry) -> Result<(), ManifestError> {
    let mut descriptor = TypeDescriptor::new(entry.name.clone(), entry.category);
    if let Some(parent) = entry.parent {
        descriptor = descriptor.with_parent(parent);
    }
    registry.register(descriptor)?;
    for alias in entry.aliases {
        registry.register_alias(alias, entry.name.clone());
    }
    Ok(())
}
