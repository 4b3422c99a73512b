//! Graph elements: one sum type for every structural category.
//!
//! Resolved elements and placeholders share [`GraphElement`]. The category
//! discriminant selects the [`ElementBody`] shape, and a placeholder is simply
//! an element carrying [`PlaceholderMetadata`] plus a reduced [`Capabilities`]
//! set. Callers check capabilities instead of relying on per-category
//! overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::id::{Guid, PortId, PortRef, ReferenceId};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Structural category of a graph element.
///
/// Also used as the placeholder category: a placeholder must satisfy the
/// structural shape of the category it stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementCategory {
    Node,
    VariableDeclaration,
    Wire,
    PortalDeclaration,
    ContextNode,
    BlockNode,
}

impl ElementCategory {
    pub const ALL: [ElementCategory; 6] = [
        ElementCategory::Node,
        ElementCategory::VariableDeclaration,
        ElementCategory::Wire,
        ElementCategory::PortalDeclaration,
        ElementCategory::ContextNode,
        ElementCategory::BlockNode,
    ];

    /// Returns `true` for categories whose body is a [`NodeData`].
    pub fn is_node(self) -> bool {
        matches!(
            self,
            ElementCategory::Node | ElementCategory::ContextNode | ElementCategory::BlockNode
        )
    }

    /// Name of the built-in base type every type of this category derives from.
    pub fn base_type_name(self) -> &'static str {
        match self {
            ElementCategory::Node => "NodeModel",
            ElementCategory::VariableDeclaration => "VariableDeclarationModel",
            ElementCategory::Wire => "WireModel",
            ElementCategory::PortalDeclaration => "PortalDeclarationModel",
            ElementCategory::ContextNode => "ContextNodeModel",
            ElementCategory::BlockNode => "BlockNodeModel",
        }
    }

    /// Stable textual form used by storage backends.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementCategory::Node => "Node",
            ElementCategory::VariableDeclaration => "VariableDeclaration",
            ElementCategory::Wire => "Wire",
            ElementCategory::PortalDeclaration => "PortalDeclaration",
            ElementCategory::ContextNode => "ContextNode",
            ElementCategory::BlockNode => "BlockNode",
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown element category '{}'", s))
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capability flags checked by callers before structural side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const DELETABLE: Capabilities = Capabilities(1 << 0);
    pub const COPIABLE: Capabilities = Capabilities(1 << 1);
    pub const RENAMABLE: Capabilities = Capabilities(1 << 2);
    /// Ports left without wires may be pruned when the node is edited.
    pub const PRUNE_DISCONNECTED_PORTS: Capabilities = Capabilities(1 << 3);
    /// Ports may be recomputed from the node's type definition.
    pub const DEFINE_NODE: Capabilities = Capabilities(1 << 4);
    /// Presentation tag: render this element in the placeholder style.
    pub const PLACEHOLDER: Capabilities = Capabilities(1 << 5);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Capabilities) {
        self.0 &= !other.0;
    }

    /// Default capability set of a resolved element.
    pub fn for_category(category: ElementCategory) -> Capabilities {
        match category {
            ElementCategory::Node | ElementCategory::ContextNode | ElementCategory::BlockNode => {
                Capabilities::DELETABLE
                    | Capabilities::COPIABLE
                    | Capabilities::RENAMABLE
                    | Capabilities::PRUNE_DISCONNECTED_PORTS
                    | Capabilities::DEFINE_NODE
            }
            ElementCategory::VariableDeclaration | ElementCategory::PortalDeclaration => {
                Capabilities::DELETABLE | Capabilities::COPIABLE | Capabilities::RENAMABLE
            }
            ElementCategory::Wire => Capabilities::DELETABLE | Capabilities::COPIABLE,
        }
    }

    /// Capability set of a placeholder standing in for `category`.
    ///
    /// Port pruning and port definition are suppressed: a port that looks
    /// unused on a placeholder may be connected once the real type returns.
    pub fn for_placeholder(category: ElementCategory) -> Capabilities {
        let mut caps = Capabilities::for_category(category);
        caps.remove(Capabilities::PRUNE_DISCONNECTED_PORTS);
        caps.remove(Capabilities::DEFINE_NODE);
        caps.remove(Capabilities::COPIABLE);
        caps.insert(Capabilities::PLACEHOLDER);
        caps
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Direction of a node port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// A node port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    pub id: PortId,
    pub direction: PortDirection,
    /// Name of the value type carried by the port.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_type: String,
}

impl Port {
    pub fn input(id: &str) -> Self {
        Port {
            id: PortId::from(id),
            direction: PortDirection::Input,
            data_type: String::new(),
        }
    }

    pub fn output(id: &str) -> Self {
        Port {
            id: PortId::from(id),
            direction: PortDirection::Output,
            data_type: String::new(),
        }
    }
}

/// Which side of a portal pair a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortalDirection {
    /// Receives data and feeds every exit sharing the declaration.
    Entry,
    /// Emits the data received by the entries sharing the declaration.
    Exit,
}

/// Link from a portal node to its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalLink {
    pub declaration: Guid,
    pub direction: PortalDirection,
}

/// Payload of node, context-node and block-node elements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ports: SmallVec<[Port; 4]>,
    /// Declaration read or written by a variable node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal: Option<PortalLink>,
    /// Blocks owned by a context node, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<GraphElement>,
    /// Type-specific serializable fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl NodeData {
    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports.iter().find(|p| &p.id == id)
    }

    pub fn has_port(&self, id: &PortId) -> bool {
        self.port(id).is_some()
    }
}

/// Scope of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableScope {
    Local,
    #[default]
    Graph,
}

/// Access modifiers of a variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModifierFlags {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// Full declaration contract; every field is defaulted but settable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableDeclaration {
    #[serde(default)]
    pub name: String,
    /// Name of the declared value type.
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub scope: VariableScope,
    #[serde(default)]
    pub modifiers: ModifierFlags,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<serde_json::Value>,
}

/// Declaration shared by the entry and exit nodes of a portal pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalDeclaration {
    #[serde(default)]
    pub name: String,
}

/// A wire between an output port (`from`) and an input port (`to`).
///
/// Both slots are optional so that a wire placeholder still exposes them
/// even when they cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireData {
    #[serde(default)]
    pub from: Option<PortRef>,
    #[serde(default)]
    pub to: Option<PortRef>,
}

impl WireData {
    pub fn new(from: PortRef, to: PortRef) -> Self {
        WireData {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns `true` if either endpoint refers to `node`.
    pub fn touches(&self, node: Guid) -> bool {
        self.from.as_ref().is_some_and(|p| p.node == node)
            || self.to.as_ref().is_some_and(|p| p.node == node)
    }
}

/// Category-shaped payload of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementBody {
    Node(NodeData),
    VariableDeclaration(VariableDeclaration),
    PortalDeclaration(PortalDeclaration),
    Wire(WireData),
}

impl ElementBody {
    /// Defaulted body satisfying the structural shape of `category`.
    pub fn default_for(category: ElementCategory) -> ElementBody {
        match category {
            ElementCategory::Node | ElementCategory::ContextNode | ElementCategory::BlockNode => {
                ElementBody::Node(NodeData::default())
            }
            ElementCategory::VariableDeclaration => {
                ElementBody::VariableDeclaration(VariableDeclaration::default())
            }
            ElementCategory::PortalDeclaration => {
                ElementBody::PortalDeclaration(PortalDeclaration::default())
            }
            ElementCategory::Wire => ElementBody::Wire(WireData::default()),
        }
    }

    /// Returns `true` if this body has the shape `category` requires.
    pub fn fits(&self, category: ElementCategory) -> bool {
        match self {
            ElementBody::Node(_) => category.is_node(),
            ElementBody::VariableDeclaration(_) => category == ElementCategory::VariableDeclaration,
            ElementBody::PortalDeclaration(_) => category == ElementCategory::PortalDeclaration,
            ElementBody::Wire(_) => category == ElementCategory::Wire,
        }
    }
}

/// Decodes a stored element payload into a body.
pub fn decode_body(payload: &[u8]) -> Result<ElementBody, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Encodes a body into the stored payload form.
pub fn encode_body(body: &ElementBody) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(body)
}

// ---------------------------------------------------------------------------
// Placeholder metadata
// ---------------------------------------------------------------------------

/// Verbatim serialized payload of an element whose type could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedPayload(Vec<u8>);

impl SerializedPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        SerializedPayload(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity retained by a placeholder so it can be re-saved and rebound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMetadata {
    pub reference_id: ReferenceId,
    pub payload: SerializedPayload,
}

// ---------------------------------------------------------------------------
// GraphElement
// ---------------------------------------------------------------------------

/// A graph element: identity, runtime type name, category and body.
///
/// Serialized as `{guid, type_name, category, body}`. A placeholder writes its
/// retained payload bytes as the body, and a body that no longer decodes into
/// the category's shape is read back as a placeholder holding those bytes with
/// [`ReferenceId::UNASSIGNED`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ElementRepr")]
pub struct GraphElement {
    guid: Guid,
    type_name: String,
    category: ElementCategory,
    body: ElementBody,
    capabilities: Capabilities,
    placeholder: Option<PlaceholderMetadata>,
}

/// Deserialized form of [`GraphElement`]; capabilities are derived, not stored.
#[derive(Deserialize)]
struct ElementRepr {
    guid: Guid,
    type_name: String,
    category: ElementCategory,
    body: Box<RawValue>,
}

impl TryFrom<ElementRepr> for GraphElement {
    type Error = CoreError;

    fn try_from(repr: ElementRepr) -> Result<Self, Self::Error> {
        let body = decode_body(repr.body.get().as_bytes())
            .ok()
            .filter(|body| body.fits(repr.category));
        match body {
            Some(body) => GraphElement::new(repr.guid, repr.type_name, repr.category, body),
            None => Ok(GraphElement::new_placeholder(
                repr.guid,
                &repr.type_name,
                repr.category,
                PlaceholderMetadata {
                    reference_id: ReferenceId::UNASSIGNED,
                    payload: SerializedPayload::new(repr.body.get()),
                },
            )),
        }
    }
}

impl Serialize for GraphElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GraphElement", 4)?;
        state.serialize_field("guid", &self.guid)?;
        state.serialize_field("type_name", &self.type_name)?;
        state.serialize_field("category", &self.category)?;
        match &self.placeholder {
            Some(metadata) => {
                let text = metadata
                    .payload
                    .as_text()
                    .ok_or_else(|| S::Error::custom("placeholder payload is not UTF-8"))?;
                let raw: &RawValue = serde_json::from_str(text).map_err(S::Error::custom)?;
                state.serialize_field("body", raw)?;
            }
            None => state.serialize_field("body", &self.body)?,
        }
        state.end()
    }
}

impl GraphElement {
    /// Creates a resolved element. The body must fit the category.
    pub fn new(
        guid: Guid,
        type_name: impl Into<String>,
        category: ElementCategory,
        body: ElementBody,
    ) -> Result<Self, CoreError> {
        if !body.fits(category) {
            return Err(CoreError::BodyShapeMismatch { category });
        }
        Ok(GraphElement {
            guid,
            type_name: type_name.into(),
            category,
            body,
            capabilities: Capabilities::for_category(category),
            placeholder: None,
        })
    }

    /// Creates a placeholder with a defaulted body for `category`.
    pub(crate) fn new_placeholder(
        guid: Guid,
        type_name: &str,
        category: ElementCategory,
        metadata: PlaceholderMetadata,
    ) -> Self {
        GraphElement {
            guid,
            type_name: type_name.to_string(),
            category,
            body: ElementBody::default_for(category),
            capabilities: Capabilities::for_placeholder(category),
            placeholder: Some(metadata),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn category(&self) -> ElementCategory {
        self.category
    }

    pub fn body(&self) -> &ElementBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ElementBody {
        &mut self.body
    }

    /// Replaces the body, keeping identity. The body must fit the category.
    pub fn replace_body(&mut self, body: ElementBody) -> Result<ElementBody, CoreError> {
        if !body.fits(self.category) {
            return Err(CoreError::BodyShapeMismatch {
                category: self.category,
            });
        }
        Ok(std::mem::replace(&mut self.body, body))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn has_capability(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub(crate) fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    pub(crate) fn set_guid(&mut self, guid: Guid) {
        self.guid = guid;
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    pub fn placeholder(&self) -> Option<&PlaceholderMetadata> {
        self.placeholder.as_ref()
    }

    pub(crate) fn placeholder_mut(&mut self) -> Option<&mut PlaceholderMetadata> {
        self.placeholder.as_mut()
    }

    /// Whether the presentation layer should render the placeholder style.
    pub fn placeholder_tag(&self) -> bool {
        self.capabilities.contains(Capabilities::PLACEHOLDER)
    }

    pub fn set_placeholder_tag(&mut self, tagged: bool) {
        if tagged {
            self.capabilities.insert(Capabilities::PLACEHOLDER);
        } else {
            self.capabilities.remove(Capabilities::PLACEHOLDER);
        }
    }

    pub fn as_node(&self) -> Option<&NodeData> {
        match &self.body {
            ElementBody::Node(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeData> {
        match &mut self.body {
            ElementBody::Node(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> Option<&WireData> {
        match &self.body {
            ElementBody::Wire(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_wire_mut(&mut self) -> Option<&mut WireData> {
        match &mut self.body {
            ElementBody::Wire(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_variable_declaration(&self) -> Option<&VariableDeclaration> {
        match &self.body {
            ElementBody::VariableDeclaration(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_portal_declaration(&self) -> Option<&PortalDeclaration> {
        match &self.body {
            ElementBody::PortalDeclaration(data) => Some(data),
            _ => None,
        }
    }

    /// The portal link of a resolved node, if any.
    pub fn portal_link(&self) -> Option<&PortalLink> {
        self.as_node().and_then(|n| n.portal.as_ref())
    }

    /// Returns `true` if `port` is a port of this resolved node.
    pub fn has_live_port(&self, port: &PortId) -> bool {
        !self.is_placeholder() && self.as_node().is_some_and(|n| n.has_port(port))
    }
}
