//! Core error types for nodegraph-core.
//!
//! [`CoreError`] covers structural misuse of the graph model. [`FactoryError`]
//! is the caller-contract failure raised by the element factory. Unresolved
//! types are deliberately absent: they degrade to placeholders instead.

use thiserror::Error;

use crate::element::ElementCategory;
use crate::id::{Guid, ReferenceId};

/// Errors produced by the graph model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No element with this GUID exists in the graph.
    #[error("element not found: {guid}")]
    ElementNotFound { guid: Guid },

    /// An element with this GUID is already present.
    #[error("duplicate element guid: {guid}")]
    DuplicateGuid { guid: Guid },

    /// The element exists but belongs to another category.
    #[error("element {guid} is a {actual}, expected {expected}")]
    WrongCategory {
        guid: Guid,
        expected: ElementCategory,
        actual: ElementCategory,
    },

    /// A body was supplied whose shape does not fit the element category.
    #[error("body shape does not fit category {category}")]
    BodyShapeMismatch { category: ElementCategory },

    /// Attempting to register a type name that already exists.
    #[error("duplicate type name: '{name}'")]
    DuplicateTypeName { name: String },

    /// A type was registered with a parent the registry does not know.
    #[error("type '{name}' names unknown parent '{parent}'")]
    UnknownParentType { name: String, parent: String },

    /// No pending placeholder is registered under this reference id.
    #[error("no placeholder registered for reference id {reference_id}")]
    UnknownReference { reference_id: ReferenceId },

    /// Rebinding targeted an element that is not a placeholder.
    #[error("element {guid} is not a placeholder")]
    NotAPlaceholder { guid: Guid },

    /// The element, or one of its blocks, lacks the copiable capability.
    #[error("element {guid} cannot be copied")]
    NotCopiable { guid: Guid },

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

/// Caller-contract violations of the element factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// The descriptor's type is not assignable to the requested base type.
    #[error("type mismatch: '{actual}' is not assignable to '{expected}'")]
    TypeMismatch { expected: String, actual: String },

    /// No descriptor was supplied; resolve first and fall back to a placeholder.
    #[error("cannot instantiate from an absent type descriptor")]
    NullDescriptor,
}
