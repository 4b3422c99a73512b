//! Common-ancestor inference over the type lattice.
//!
//! Used by multi-selection operations to find the most specific type every
//! selected element is assignable to. The reduction is commutative: the
//! result does not depend on input order.

use crate::element::GraphElement;
use crate::type_registry::{TypeRegistry, ROOT_TYPE};

/// Most specific type shared by every non-null entry of `types`.
///
/// Returns `None` when the input is empty or every entry is `None`. Type
/// names are canonicalized through the registry's aliases first; unknown
/// names hang directly off the root.
pub fn common_ancestor_type<'a, I>(registry: &TypeRegistry, types: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut candidate: Option<String> = None;
    for ty in types.into_iter().flatten() {
        let ty = registry.canonical_name(ty);
        candidate = Some(match candidate {
            None => ty.to_string(),
            Some(current) => narrow(registry, current, ty),
        });
    }
    candidate
}

/// [`common_ancestor_type`] over the runtime types of `elements`.
pub fn common_ancestor_of<'a, I>(registry: &TypeRegistry, elements: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a GraphElement>>,
{
    common_ancestor_type(
        registry,
        elements
            .into_iter()
            .map(|e| e.map(GraphElement::type_name)),
    )
}

/// Widens `candidate` until `ty` is assignable to it.
fn narrow(registry: &TypeRegistry, mut candidate: String, ty: &str) -> String {
    while !registry.is_assignable(ty, &candidate) {
        match registry.parent_name(&candidate) {
            Some(parent) => candidate = parent.to_string(),
            None => return ROOT_TYPE.to_string(),
        }
    }
    candidate
}
