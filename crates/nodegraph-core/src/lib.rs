//! Graph data model with placeholder substitution and derived dependencies.
//!
//! # Modules
//!
//! - [`element`] -- Element categories, bodies, capabilities and [`GraphElement`]
//! - [`type_registry`] -- Type descriptors and resolution by stored identifier
//! - [`factory`] -- Polymorphic instantiation from a resolved descriptor
//! - [`placeholder`] -- Stand-ins for unresolved types and rebinding
//! - [`graph`] -- The owning [`GraphModel`]
//! - [`dependency`] -- Dependencies derived from wires and portal pairs
//! - [`ancestry`], [`clone`] -- Structural utilities

pub mod ancestry;
pub mod clone;
pub mod dependency;
pub mod element;
pub mod error;
pub mod factory;
pub mod graph;
pub mod id;
pub mod placeholder;
pub mod type_registry;

// Re-export commonly used types
pub use ancestry::{common_ancestor_of, common_ancestor_type};
pub use clone::{structural_clone, CloneOutcome};
pub use dependency::{Dependency, DependencyGraph, LinkedNodesDependency, PortalNodesDependency};
pub use element::{
    Capabilities, ElementBody, ElementCategory, GraphElement, NodeData, PlaceholderMetadata, Port,
    PortalDirection, PortalLink, SerializedPayload, WireData,
};
pub use error::{CoreError, FactoryError};
pub use factory::{BaseType, ElementFactory};
pub use graph::GraphModel;
pub use id::{Guid, PortId, PortRef, ReferenceId};
pub use placeholder::{
    PlaceholderRegistry, RebindReport, SubstitutedBlock, SubstitutionReason,
};
pub use type_registry::{TypeDescriptor, TypeRegistry, ROOT_TYPE, VARIABLE_NODE_TYPE};
