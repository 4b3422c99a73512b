//! Element factory: construct elements from resolved type descriptors.
//!
//! The factory never substitutes placeholders. Callers resolve a type first
//! and branch to the [`PlaceholderRegistry`](crate::placeholder::PlaceholderRegistry)
//! when resolution fails; handing the factory an absent descriptor is a
//! contract violation reported as [`FactoryError::NullDescriptor`].

use crate::element::GraphElement;
use crate::error::FactoryError;
use crate::id::Guid;
use crate::type_registry::{TypeDescriptor, TypeRegistry, ROOT_TYPE, VARIABLE_NODE_TYPE};

/// Compile-time handle on a base type of the lattice.
pub trait BaseType {
    const NAME: &'static str;
}

/// Any graph element.
pub struct AnyElement;
/// Any node, including context and block nodes.
pub struct NodeModel;
pub struct VariableNodeModel;
pub struct ContextNodeModel;
pub struct BlockNodeModel;
pub struct VariableDeclarationModel;
pub struct PortalDeclarationModel;
pub struct WireModel;

impl BaseType for AnyElement {
    const NAME: &'static str = ROOT_TYPE;
}
impl BaseType for NodeModel {
    const NAME: &'static str = "NodeModel";
}
impl BaseType for VariableNodeModel {
    const NAME: &'static str = VARIABLE_NODE_TYPE;
}
impl BaseType for ContextNodeModel {
    const NAME: &'static str = "ContextNodeModel";
}
impl BaseType for BlockNodeModel {
    const NAME: &'static str = "BlockNodeModel";
}
impl BaseType for VariableDeclarationModel {
    const NAME: &'static str = "VariableDeclarationModel";
}
impl BaseType for PortalDeclarationModel {
    const NAME: &'static str = "PortalDeclarationModel";
}
impl BaseType for WireModel {
    const NAME: &'static str = "WireModel";
}

/// Instantiates elements polymorphically over their category.
#[derive(Debug, Clone, Copy)]
pub struct ElementFactory<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> ElementFactory<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        ElementFactory { registry }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Instantiates `descriptor` as an element assignable to `B`.
    pub fn instantiate<B: BaseType>(
        &self,
        descriptor: Option<&TypeDescriptor>,
        guid: Guid,
    ) -> Result<GraphElement, FactoryError> {
        self.instantiate_as(descriptor, B::NAME, guid)
    }

    /// Runtime form of [`instantiate`](Self::instantiate) with the base named
    /// by string.
    pub fn instantiate_as(
        &self,
        descriptor: Option<&TypeDescriptor>,
        base: &str,
        guid: Guid,
    ) -> Result<GraphElement, FactoryError> {
        let descriptor = descriptor.ok_or(FactoryError::NullDescriptor)?;
        if descriptor.name() == ROOT_TYPE || !self.registry.is_assignable(descriptor.name(), base)
        {
            return Err(FactoryError::TypeMismatch {
                expected: base.to_string(),
                actual: descriptor.name().to_string(),
            });
        }
        GraphElement::new(
            guid,
            descriptor.name(),
            descriptor.category(),
            descriptor.construct(),
        )
        // A constructor returning the wrong shape is a registration bug.
        .map_err(|_| FactoryError::TypeMismatch {
            expected: descriptor.category().base_type_name().to_string(),
            actual: descriptor.name().to_string(),
        })
    }
}
