//! Type descriptors and the [`TypeRegistry`] resolver.
//!
//! The registry is a registered-constructor table: each stored type
//! identifier maps to a [`TypeDescriptor`] holding its category, its parent in
//! the single-inheritance type lattice and a constructor producing a default
//! body. Resolution is a pure lookup; absence is a normal outcome.
//!
//! On construction the registry pre-registers the lattice root
//! [`ROOT_TYPE`], one base type per [`ElementCategory`] and
//! `VariableNodeModel`:
//!
//! ```text
//! GraphElementModel
//! ├── NodeModel
//! │   ├── ContextNodeModel
//! │   ├── BlockNodeModel
//! │   └── VariableNodeModel
//! ├── VariableDeclarationModel
//! ├── PortalDeclarationModel
//! └── WireModel
//! ```

use std::collections::HashMap;

use crate::element::{ElementBody, ElementCategory, GraphElement};
use crate::error::CoreError;

/// Name of the root of the type lattice.
pub const ROOT_TYPE: &str = "GraphElementModel";

/// Name of the built-in variable node type.
pub const VARIABLE_NODE_TYPE: &str = "VariableNodeModel";

/// Builds the default body of a freshly instantiated element.
pub type Constructor = fn() -> ElementBody;

/// Type-specific clone behaviour, used instead of structural copy.
pub type CustomClone = fn(&GraphElement) -> GraphElement;

/// Live description of a registered element type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    category: ElementCategory,
    parent: Option<String>,
    constructor: Option<Constructor>,
    custom_clone: Option<CustomClone>,
}

impl TypeDescriptor {
    /// A descriptor deriving from the category's base type.
    pub fn new(name: impl Into<String>, category: ElementCategory) -> Self {
        TypeDescriptor {
            name: name.into(),
            category,
            parent: Some(category.base_type_name().to_string()),
            constructor: None,
            custom_clone: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn with_custom_clone(mut self, clone: CustomClone) -> Self {
        self.custom_clone = Some(clone);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ElementCategory {
        self.category
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn custom_clone(&self) -> Option<CustomClone> {
        self.custom_clone
    }

    /// Builds a default body for this type.
    pub fn construct(&self) -> ElementBody {
        match self.constructor {
            Some(constructor) => constructor(),
            None => ElementBody::default_for(self.category),
        }
    }

    fn root() -> Self {
        TypeDescriptor {
            name: ROOT_TYPE.to_string(),
            // The root is never instantiated; the category is nominal.
            category: ElementCategory::Node,
            parent: None,
            constructor: None,
            custom_clone: None,
        }
    }
}

/// Registry of element types, keyed by stored type identifier.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
    /// Renamed type identifiers: old name -> new name.
    aliases: HashMap<String, String>,
}

impl TypeRegistry {
    /// Creates a registry holding the root and the built-in base types.
    pub fn new() -> Self {
        let mut types = HashMap::new();
        types.insert(ROOT_TYPE.to_string(), TypeDescriptor::root());

        let bases = [
            (ElementCategory::Node, ROOT_TYPE),
            (ElementCategory::VariableDeclaration, ROOT_TYPE),
            (ElementCategory::Wire, ROOT_TYPE),
            (ElementCategory::PortalDeclaration, ROOT_TYPE),
            (ElementCategory::ContextNode, ElementCategory::Node.base_type_name()),
            (ElementCategory::BlockNode, ElementCategory::Node.base_type_name()),
        ];
        for (category, parent) in bases {
            let name = category.base_type_name();
            types.insert(
                name.to_string(),
                TypeDescriptor::new(name, category).with_parent(parent),
            );
        }
        types.insert(
            VARIABLE_NODE_TYPE.to_string(),
            TypeDescriptor::new(VARIABLE_NODE_TYPE, ElementCategory::Node),
        );

        TypeRegistry {
            types,
            aliases: HashMap::new(),
        }
    }

    /// Registers a descriptor. Its parent must already be registered.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<(), CoreError> {
        if self.types.contains_key(descriptor.name()) {
            return Err(CoreError::DuplicateTypeName {
                name: descriptor.name().to_string(),
            });
        }
        if let Some(parent) = descriptor.parent() {
            if !self.types.contains_key(parent) {
                return Err(CoreError::UnknownParentType {
                    name: descriptor.name().to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        self.types.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    /// Records that `old_name` was renamed to `new_name`.
    pub fn register_alias(&mut self, old_name: impl Into<String>, new_name: impl Into<String>) {
        self.aliases.insert(old_name.into(), new_name.into());
    }

    /// Resolves a stored type identifier, following renames.
    ///
    /// Returns `None` for unknown identifiers and for alias cycles.
    pub fn resolve(&self, name: &str) -> Option<&TypeDescriptor> {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            if let Some(descriptor) = self.types.get(current) {
                return Some(descriptor);
            }
            current = self.aliases.get(current)?.as_str();
        }
        None
    }

    /// Canonical name of `name`: the resolved type's name, or `name` itself
    /// when unknown.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.resolve(name).map_or(name, TypeDescriptor::name)
    }

    /// Parent of `name` in the lattice. Unknown types hang off the root.
    pub fn parent_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        match self.resolve(name) {
            Some(descriptor) => descriptor.parent(),
            None if name == ROOT_TYPE => None,
            None => Some(ROOT_TYPE),
        }
    }

    /// Returns `true` if a value of type `ty` can be used where `base` is expected.
    pub fn is_assignable(&self, ty: &str, base: &str) -> bool {
        let base = self.canonical_name(base);
        if base == ROOT_TYPE {
            return true;
        }
        let mut current = Some(self.canonical_name(ty));
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self.parent_name(name);
        }
        false
    }

    /// Number of registered types, built-ins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates registered type names in arbitrary order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
