//! Structural clone of graph elements.
//!
//! A type may register a custom clone in its [`TypeDescriptor`]; otherwise
//! the element is rebuilt through the [`ElementFactory`] and its fields are
//! deep-copied. Either way the post-clone hook assigns fresh GUIDs to the
//! copy and every block it owns, so a clone never aliases the original.
//!
//! Blocks whose type declares a custom clone cannot be honoured by a
//! structural copy of their container. They are still copied structurally,
//! logged at error level and listed in [`CloneOutcome::unsupported_children`].
//!
//! Elements without [`Capabilities::COPIABLE`], placeholders among them, are
//! refused, as is any container holding one.
//!
//! [`TypeDescriptor`]: crate::type_registry::TypeDescriptor

use tracing::{debug, error};

use crate::element::{Capabilities, GraphElement};
use crate::error::CoreError;
use crate::factory::{AnyElement, ElementFactory};
use crate::id::Guid;
use crate::type_registry::TypeRegistry;

/// Result of [`structural_clone`].
#[derive(Debug, Clone, PartialEq)]
pub struct CloneOutcome {
    pub element: GraphElement,
    /// GUIDs (in the original) of blocks with custom clone behaviour that
    /// were copied structurally anyway.
    pub unsupported_children: Vec<Guid>,
}

/// Clones `element` with fresh identity.
pub fn structural_clone(
    registry: &TypeRegistry,
    element: &GraphElement,
) -> Result<CloneOutcome, CoreError> {
    ensure_copiable(element)?;
    let custom = registry
        .resolve(element.type_name())
        .and_then(|d| d.custom_clone());
    let mut unsupported_children = Vec::new();
    let mut copy = match custom {
        Some(custom_clone) => custom_clone(element),
        None => {
            find_custom_children(registry, element, &mut unsupported_children);
            copy_fields(registry, element)
        }
    };
    post_clone(&mut copy);
    Ok(CloneOutcome {
        element: copy,
        unsupported_children,
    })
}

fn ensure_copiable(element: &GraphElement) -> Result<(), CoreError> {
    if !element.has_capability(Capabilities::COPIABLE) {
        return Err(CoreError::NotCopiable {
            guid: element.guid(),
        });
    }
    match element.as_node() {
        Some(data) => data.blocks.iter().try_for_each(ensure_copiable),
        None => Ok(()),
    }
}

/// Field-by-field copy through the factory, falling back to a plain deep copy
/// for types the registry does not know.
fn copy_fields(registry: &TypeRegistry, element: &GraphElement) -> GraphElement {
    let factory = ElementFactory::new(registry);
    let instantiated = factory
        .instantiate::<AnyElement>(registry.resolve(element.type_name()), element.guid())
        .ok()
        .filter(|fresh| fresh.category() == element.category());
    let Some(mut fresh) = instantiated else {
        debug!(type_name = element.type_name(), "type not instantiable, copying as-is");
        return element.clone();
    };
    if fresh.replace_body(element.body().clone()).is_err() {
        return element.clone();
    }
    fresh.set_capabilities(element.capabilities());
    fresh
}

fn find_custom_children(registry: &TypeRegistry, element: &GraphElement, found: &mut Vec<Guid>) {
    let Some(data) = element.as_node() else {
        return;
    };
    for block in &data.blocks {
        let custom = registry
            .resolve(block.type_name())
            .is_some_and(|d| d.custom_clone().is_some());
        if custom {
            error!(
                container = %element.guid(),
                child = %block.guid(),
                type_name = block.type_name(),
                "cannot honour custom clone of a child; copying it structurally"
            );
            found.push(block.guid());
        }
        find_custom_children(registry, block, found);
    }
}

/// Assigns fresh GUIDs to `element` and its blocks.
fn post_clone(element: &mut GraphElement) {
    element.set_guid(Guid::generate());
    if let Some(data) = element.as_node_mut() {
        for block in &mut data.blocks {
            post_clone(block);
        }
    }
}
