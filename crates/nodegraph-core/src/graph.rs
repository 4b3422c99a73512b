//! GraphModel: the owning container of a graph's elements.
//!
//! [`GraphModel`] owns every element, keeps them in document order and is the
//! single entry point for mutations. Each mutation that changes connectivity
//! updates the derived [`DependencyGraph`] before returning, so dependency
//! queries never observe stale state.
//!
//! Context nodes own their blocks; blocks are addressable by GUID through the
//! model like top-level elements, and wires may target their ports.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::dependency::{Dependency, DependencyGraph};
use crate::element::{
    Capabilities, ElementBody, ElementCategory, GraphElement, NodeData, Port, WireData,
};
use crate::error::CoreError;
use crate::id::{Guid, PortId, PortRef, ReferenceId};
use crate::placeholder::RebindReport;
use crate::type_registry::TypeRegistry;

/// Element storage with block lookup.
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementStore {
    pub(crate) elements: IndexMap<Guid, GraphElement>,
    /// Block GUID -> owning node GUID.
    pub(crate) block_owners: HashMap<Guid, Guid>,
}

impl ElementStore {
    pub(crate) fn get(&self, guid: Guid) -> Option<&GraphElement> {
        if let Some(element) = self.elements.get(&guid) {
            return Some(element);
        }
        let owner = self.block_owners.get(&guid)?;
        self.elements
            .get(owner)?
            .as_node()?
            .blocks
            .iter()
            .find(|b| b.guid() == guid)
    }

    fn get_mut(&mut self, guid: Guid) -> Option<&mut GraphElement> {
        if self.elements.contains_key(&guid) {
            return self.elements.get_mut(&guid);
        }
        let owner = *self.block_owners.get(&guid)?;
        self.elements
            .get_mut(&owner)?
            .as_node_mut()?
            .blocks
            .iter_mut()
            .find(|b| b.guid() == guid)
    }

    /// Returns `true` if `port` names a port on a resolved node.
    pub(crate) fn is_live_port(&self, port: &PortRef) -> bool {
        self.get(port.node)
            .is_some_and(|e| e.has_live_port(&port.port))
    }
}

fn block_guids(element: &GraphElement) -> Vec<Guid> {
    element
        .as_node()
        .map(|n| n.blocks.iter().map(GraphElement::guid).collect())
        .unwrap_or_default()
}

/// A graph document: ordered elements plus derived dependencies.
#[derive(Debug, Clone)]
pub struct GraphModel {
    guid: Guid,
    name: String,
    store: ElementStore,
    /// Node or block GUID -> wires with an endpoint on it, placeholders included.
    wire_index: HashMap<Guid, IndexSet<Guid>>,
    dependencies: DependencyGraph,
}

impl GraphModel {
    pub fn new(name: &str) -> Self {
        Self::with_guid(Guid::generate(), name)
    }

    pub fn with_guid(guid: Guid, name: &str) -> Self {
        GraphModel {
            guid,
            name: name.to_string(),
            store: ElementStore::default(),
            wire_index: HashMap::new(),
            dependencies: DependencyGraph::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn store(&self) -> &ElementStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Number of top-level elements.
    pub fn len(&self) -> usize {
        self.store.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.elements.is_empty()
    }

    /// Returns `true` if an element or block with this GUID exists.
    pub fn contains(&self, guid: Guid) -> bool {
        self.store.get(guid).is_some()
    }

    /// Looks up an element or a block by GUID.
    pub fn get(&self, guid: Guid) -> Option<&GraphElement> {
        self.store.get(guid)
    }

    /// Top-level elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &GraphElement> {
        self.store.elements.values()
    }

    /// Position of a top-level element in document order.
    pub fn position_of(&self, guid: Guid) -> Option<usize> {
        self.store.elements.get_index_of(&guid)
    }

    /// Top-level nodes of every node category.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphElement> {
        self.elements().filter(|e| e.category().is_node())
    }

    pub fn wires(&self) -> impl Iterator<Item = &GraphElement> {
        self.elements()
            .filter(|e| e.category() == ElementCategory::Wire)
    }

    /// Placeholders in document order, blocks included.
    pub fn placeholders(&self) -> impl Iterator<Item = &GraphElement> {
        self.elements()
            .flat_map(|e| {
                std::iter::once(e).chain(e.as_node().into_iter().flat_map(|n| n.blocks.iter()))
            })
            .filter(|e| e.is_placeholder())
    }

    pub fn find_by_reference_id(&self, reference_id: ReferenceId) -> Option<&GraphElement> {
        self.placeholders()
            .find(|e| e.placeholder().is_some_and(|m| m.reference_id == reference_id))
    }

    /// Wires with an endpoint on `node`.
    pub fn wires_of(&self, node: Guid) -> impl Iterator<Item = &GraphElement> {
        self.wire_index
            .get(&node)
            .into_iter()
            .flat_map(|wires| wires.iter())
            .filter_map(|w| self.store.get(*w))
    }

    /// Returns `true` if `port` names a port on a resolved node.
    pub fn is_live_port(&self, port: &PortRef) -> bool {
        self.store.is_live_port(port)
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Dependencies in which `node` is the parent.
    pub fn dependents_of(&self, node: Guid) -> Vec<&Dependency> {
        self.dependencies.dependents_of(node)
    }

    /// Dependencies in which `node` is the dependent.
    pub fn dependencies_of(&self, node: Guid) -> Vec<&Dependency> {
        self.dependencies.dependencies_of(node)
    }

    /// Top-level nodes grouped into components, parents first.
    pub fn processing_order(&self) -> Vec<Vec<Guid>> {
        self.dependencies
            .processing_order(self.nodes().map(GraphElement::guid))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Appends an element at the end of the document.
    pub fn insert(&mut self, element: GraphElement) -> Result<Guid, CoreError> {
        let guid = element.guid();
        let blocks = block_guids(&element);
        self.check_fresh(guid, &blocks)?;

        if let Some(wire) = element.as_wire() {
            self.index_wire(guid, wire);
        }
        for block in &blocks {
            self.store.block_owners.insert(*block, guid);
        }
        self.store.elements.insert(guid, element);
        self.after_insert(guid, &blocks);
        Ok(guid)
    }

    /// Creates and inserts a resolved wire between two ports.
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<Guid, CoreError> {
        let wire = GraphElement::new(
            Guid::generate(),
            ElementCategory::Wire.base_type_name(),
            ElementCategory::Wire,
            ElementBody::Wire(WireData::new(from, to)),
        )?;
        self.insert(wire)
    }

    /// Removes an element or a block. Removing a node also removes every wire
    /// attached to it or to its blocks.
    pub fn remove(&mut self, guid: Guid) -> Result<GraphElement, CoreError> {
        if let Some(owner) = self.store.block_owners.get(&guid).copied() {
            return self.remove_block(owner, guid);
        }
        let element = self
            .store
            .elements
            .get(&guid)
            .ok_or(CoreError::ElementNotFound { guid })?;

        if element.category() == ElementCategory::Wire {
            self.dependencies.wire_removed(guid);
            let element = self
                .store
                .elements
                .shift_remove(&guid)
                .ok_or(CoreError::ElementNotFound { guid })?;
            if let Some(wire) = element.as_wire() {
                self.unindex_wire(guid, wire);
            }
            return Ok(element);
        }

        let blocks = block_guids(element);
        self.remove_attached_wires(std::iter::once(guid).chain(blocks.iter().copied()))?;

        let element = self
            .store
            .elements
            .shift_remove(&guid)
            .ok_or(CoreError::ElementNotFound { guid })?;
        for block in &blocks {
            self.store.block_owners.remove(block);
            self.dependencies.node_removed(&self.store, *block, None);
        }
        let portal = element.portal_link().map(|l| l.declaration);
        self.dependencies.node_removed(&self.store, guid, portal);
        debug!(%guid, category = %element.category(), "element removed");
        Ok(element)
    }

    /// Moves a wire's endpoints.
    pub fn set_wire_endpoints(
        &mut self,
        wire: Guid,
        from: Option<PortRef>,
        to: Option<PortRef>,
    ) -> Result<(), CoreError> {
        let element = self
            .store
            .elements
            .get(&wire)
            .ok_or(CoreError::ElementNotFound { guid: wire })?;
        let old = element
            .as_wire()
            .cloned()
            .ok_or(CoreError::WrongCategory {
                guid: wire,
                expected: ElementCategory::Wire,
                actual: element.category(),
            })?;

        self.dependencies.wire_removed(wire);
        self.unindex_wire(wire, &old);
        let data = WireData { from, to };
        self.index_wire(wire, &data);
        if let Some(element) = self.store.elements.get_mut(&wire) {
            element.replace_body(ElementBody::Wire(data))?;
        }
        self.dependencies.wire_added(&self.store, wire);
        Ok(())
    }

    /// Adds a port to a node; wires already targeting it become live.
    pub fn add_port(&mut self, node: Guid, port: Port) -> Result<(), CoreError> {
        let data = self.node_data_mut(node)?;
        if !data.has_port(&port.id) {
            data.ports.push(port);
        }
        self.refresh_node_wires(node);
        Ok(())
    }

    /// Removes ports of `node` that no wire references.
    ///
    /// Returns `Ok(false)` without touching the node when it lacks
    /// [`Capabilities::PRUNE_DISCONNECTED_PORTS`], as placeholders do.
    pub fn prune_disconnected_ports(&mut self, node: Guid) -> Result<bool, CoreError> {
        let element = self.get(node).ok_or(CoreError::ElementNotFound { guid: node })?;
        if !element.has_capability(Capabilities::PRUNE_DISCONNECTED_PORTS) {
            return Ok(false);
        }
        let connected: HashSet<PortId> = self
            .wires_of(node)
            .filter_map(GraphElement::as_wire)
            .flat_map(|w| [w.from.as_ref(), w.to.as_ref()])
            .flatten()
            .filter(|p| p.node == node)
            .map(|p| p.port.clone())
            .collect();
        let data = self.node_data_mut(node)?;
        data.ports.retain(|p| connected.contains(&p.id));
        Ok(true)
    }

    /// Recomputes the ports of `node` from its registered type.
    ///
    /// Returns `Ok(false)` when the node lacks [`Capabilities::DEFINE_NODE`]
    /// or its type does not resolve.
    pub fn define_node(&mut self, node: Guid, registry: &TypeRegistry) -> Result<bool, CoreError> {
        let element = self.get(node).ok_or(CoreError::ElementNotFound { guid: node })?;
        if !element.has_capability(Capabilities::DEFINE_NODE) {
            return Ok(false);
        }
        let Some(descriptor) = registry.resolve(element.type_name()) else {
            return Ok(false);
        };
        let ElementBody::Node(defined) = descriptor.construct() else {
            return Ok(false);
        };
        let data = self.node_data_mut(node)?;
        data.ports = defined.ports;
        self.refresh_node_wires(node);
        Ok(true)
    }

    /// Sets a type-specific field on a node, returning the previous value.
    pub fn set_field(
        &mut self,
        node: Guid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, CoreError> {
        let data = self.node_data_mut(node)?;
        Ok(data.fields.insert(key.to_string(), value))
    }

    /// Swaps a placeholder for its resolved element in place.
    ///
    /// Document position is kept. When the resolved element has a new GUID,
    /// wire endpoints and variable/portal references are rewritten to it.
    pub(crate) fn replace_placeholder(
        &mut self,
        reference_id: ReferenceId,
        old: Guid,
        resolved: GraphElement,
    ) -> Result<RebindReport, CoreError> {
        if let Some(owner) = self.store.block_owners.get(&old).copied() {
            return self.replace_block_placeholder(reference_id, owner, old, resolved);
        }
        let position = self
            .store
            .elements
            .get_index_of(&old)
            .ok_or(CoreError::ElementNotFound { guid: old })?;
        let placeholder = &self.store.elements[position];
        if !placeholder.is_placeholder() {
            return Err(CoreError::NotAPlaceholder { guid: old });
        }
        if placeholder.category() != resolved.category() {
            return Err(CoreError::WrongCategory {
                guid: old,
                expected: placeholder.category(),
                actual: resolved.category(),
            });
        }
        let new = resolved.guid();
        let blocks = block_guids(&resolved);
        let old_blocks = block_guids(placeholder);
        if new != old && self.contains(new) {
            return Err(CoreError::DuplicateGuid { guid: new });
        }
        for block in &blocks {
            if !old_blocks.contains(block) && self.contains(*block) {
                return Err(CoreError::DuplicateGuid { guid: *block });
            }
        }

        if let Some((_, removed)) = self.store.elements.shift_remove_index(position) {
            if let Some(wire) = removed.as_wire() {
                self.unindex_wire(old, wire);
            }
        }
        for block in &old_blocks {
            self.store.block_owners.remove(block);
        }
        self.dependencies.node_removed(&self.store, old, None);

        let mut report = RebindReport {
            reference_id,
            old_guid: old,
            new_guid: new,
            rewired_wires: 0,
            rewired_references: 0,
        };
        if new != old {
            report.rewired_wires = self.rewire_wires(old, new);
            report.rewired_references = self.rewire_declaration_refs(old, new);
            self.dependencies.rekey_portal_declaration(old, new);
        }

        if let Some(wire) = resolved.as_wire() {
            self.index_wire(new, wire);
        }
        for block in &blocks {
            self.store.block_owners.insert(*block, new);
        }
        self.store.elements.shift_insert(position, new, resolved);
        self.after_insert(new, &blocks);
        debug!(%old, %new, reference = %reference_id, "placeholder replaced");
        Ok(report)
    }

    fn replace_block_placeholder(
        &mut self,
        reference_id: ReferenceId,
        owner: Guid,
        old: Guid,
        resolved: GraphElement,
    ) -> Result<RebindReport, CoreError> {
        let new = resolved.guid();
        if new != old && self.contains(new) {
            return Err(CoreError::DuplicateGuid { guid: new });
        }
        let data = self.node_data_mut(owner)?;
        let slot = data
            .blocks
            .iter_mut()
            .find(|b| b.guid() == old)
            .ok_or(CoreError::ElementNotFound { guid: old })?;
        if !slot.is_placeholder() {
            return Err(CoreError::NotAPlaceholder { guid: old });
        }
        if slot.category() != resolved.category() {
            return Err(CoreError::WrongCategory {
                guid: old,
                expected: slot.category(),
                actual: resolved.category(),
            });
        }
        *slot = resolved;

        self.store.block_owners.remove(&old);
        self.store.block_owners.insert(new, owner);
        self.dependencies.node_removed(&self.store, old, None);

        let mut report = RebindReport {
            reference_id,
            old_guid: old,
            new_guid: new,
            rewired_wires: 0,
            rewired_references: 0,
        };
        if new != old {
            report.rewired_wires = self.rewire_wires(old, new);
        }
        self.refresh_node_wires(new);
        debug!(%old, %new, %owner, "block placeholder replaced");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_fresh(&self, guid: Guid, blocks: &[Guid]) -> Result<(), CoreError> {
        let mut seen = HashSet::from([guid]);
        if self.contains(guid) {
            return Err(CoreError::DuplicateGuid { guid });
        }
        for block in blocks {
            if !seen.insert(*block) || self.contains(*block) {
                return Err(CoreError::DuplicateGuid { guid: *block });
            }
        }
        Ok(())
    }

    fn after_insert(&mut self, guid: Guid, blocks: &[Guid]) {
        let Some(element) = self.store.get(guid) else {
            return;
        };
        let is_portal = element.portal_link().is_some();
        match element.category() {
            ElementCategory::Wire => self.dependencies.wire_added(&self.store, guid),
            ElementCategory::PortalDeclaration => {
                self.dependencies.refresh_portal(&self.store, guid)
            }
            ElementCategory::VariableDeclaration => {}
            ElementCategory::Node | ElementCategory::ContextNode | ElementCategory::BlockNode => {
                for node in std::iter::once(guid).chain(blocks.iter().copied()) {
                    self.count_node_wires(node);
                }
                if is_portal {
                    self.dependencies.portal_member_added(&self.store, guid);
                }
            }
        }
    }

    fn count_node_wires(&mut self, node: Guid) {
        let wires: Vec<Guid> = self
            .wire_index
            .get(&node)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default();
        for wire in wires {
            self.dependencies.wire_added(&self.store, wire);
        }
    }

    /// Re-evaluates every wire touching `node` after its ports changed.
    fn refresh_node_wires(&mut self, node: Guid) {
        let wires: Vec<Guid> = self
            .wire_index
            .get(&node)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default();
        for wire in &wires {
            self.dependencies.wire_removed(*wire);
        }
        for wire in wires {
            self.dependencies.wire_added(&self.store, wire);
        }
    }

    fn remove_attached_wires(&mut self, nodes: impl Iterator<Item = Guid>) -> Result<(), CoreError> {
        let wires: IndexSet<Guid> = nodes
            .filter_map(|n| self.wire_index.get(&n))
            .flat_map(|w| w.iter().copied())
            .collect();
        for wire in wires {
            if self.store.elements.contains_key(&wire) {
                self.remove(wire)?;
            }
        }
        Ok(())
    }

    fn remove_block(&mut self, owner: Guid, block: Guid) -> Result<GraphElement, CoreError> {
        self.remove_attached_wires(std::iter::once(block))?;
        let data = self.node_data_mut(owner)?;
        let index = data
            .blocks
            .iter()
            .position(|b| b.guid() == block)
            .ok_or(CoreError::ElementNotFound { guid: block })?;
        let removed = data.blocks.remove(index);
        self.store.block_owners.remove(&block);
        self.dependencies.node_removed(&self.store, block, None);
        Ok(removed)
    }

    fn node_data_mut(&mut self, node: Guid) -> Result<&mut NodeData, CoreError> {
        let element = self
            .store
            .get_mut(node)
            .ok_or(CoreError::ElementNotFound { guid: node })?;
        let actual = element.category();
        element.as_node_mut().ok_or(CoreError::WrongCategory {
            guid: node,
            expected: ElementCategory::Node,
            actual,
        })
    }

    fn index_wire(&mut self, wire: Guid, data: &WireData) {
        for endpoint in [&data.from, &data.to].into_iter().flatten() {
            self.wire_index
                .entry(endpoint.node)
                .or_default()
                .insert(wire);
        }
    }

    fn unindex_wire(&mut self, wire: Guid, data: &WireData) {
        for endpoint in [&data.from, &data.to].into_iter().flatten() {
            if let Some(wires) = self.wire_index.get_mut(&endpoint.node) {
                wires.shift_remove(&wire);
                if wires.is_empty() {
                    self.wire_index.remove(&endpoint.node);
                }
            }
        }
    }

    /// Points every wire endpoint on `old` at `new`. Returns the wire count.
    fn rewire_wires(&mut self, old: Guid, new: Guid) -> usize {
        let Some(wires) = self.wire_index.remove(&old) else {
            return 0;
        };
        let mut rewired = 0;
        for wire in &wires {
            let Some(data) = self
                .store
                .elements
                .get_mut(wire)
                .and_then(GraphElement::as_wire_mut)
            else {
                continue;
            };
            for endpoint in [&mut data.from, &mut data.to].into_iter().flatten() {
                if endpoint.node == old {
                    endpoint.node = new;
                }
            }
            rewired += 1;
        }
        self.wire_index.entry(new).or_default().extend(wires);
        rewired
    }

    /// Points variable and portal references on `old` at `new`.
    fn rewire_declaration_refs(&mut self, old: Guid, new: Guid) -> usize {
        let mut rewired = 0;
        for element in self.store.elements.values_mut() {
            let Some(data) = element.as_node_mut() else {
                continue;
            };
            for block in data.blocks.iter_mut().filter_map(GraphElement::as_node_mut) {
                rewired += rewire_node_refs(block, old, new);
            }
            rewired += rewire_node_refs(data, old, new);
        }
        rewired
    }
}

fn rewire_node_refs(data: &mut NodeData, old: Guid, new: Guid) -> usize {
    let mut rewired = 0;
    if data.variable == Some(old) {
        data.variable = Some(new);
        rewired += 1;
    }
    if let Some(portal) = data.portal.as_mut() {
        if portal.declaration == old {
            portal.declaration = new;
            rewired += 1;
        }
    }
    rewired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{PortalDeclaration, PortalDirection, PortalLink};

    fn node_with(ports: &[Port]) -> GraphElement {
        GraphElement::new(
            Guid::generate(),
            "NodeModel",
            ElementCategory::Node,
            ElementBody::Node(NodeData {
                ports: ports.iter().cloned().collect(),
                ..NodeData::default()
            }),
        )
        .unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut graph = GraphModel::new("main");
        let a = graph.insert(node_with(&[Port::output("out")])).unwrap();
        assert!(graph.contains(a));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.position_of(a), Some(0));
        assert_eq!(graph.nodes().count(), 1);
    }

    #[test]
    fn duplicate_guid_is_rejected() {
        let mut graph = GraphModel::new("main");
        let node = node_with(&[]);
        graph.insert(node.clone()).unwrap();
        assert!(matches!(
            graph.insert(node),
            Err(CoreError::DuplicateGuid { .. })
        ));
    }

    #[test]
    fn wire_inserted_before_nodes_is_counted_when_they_arrive() {
        let mut graph = GraphModel::new("main");
        let a = node_with(&[Port::output("out")]);
        let b = node_with(&[Port::input("in")]);
        let (ga, gb) = (a.guid(), b.guid());
        graph
            .connect(PortRef::new(ga, "out"), PortRef::new(gb, "in"))
            .unwrap();
        assert!(graph.dependencies().is_empty());
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();
        assert_eq!(graph.dependents_of(ga).len(), 1);
    }

    #[test]
    fn added_port_makes_wire_live() {
        let mut graph = GraphModel::new("main");
        let a = graph.insert(node_with(&[Port::output("out")])).unwrap();
        let b = graph.insert(node_with(&[])).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "in"))
            .unwrap();
        assert!(graph.dependencies().is_empty());
        graph.add_port(b, Port::input("in")).unwrap();
        assert_eq!(graph.dependencies_of(b).len(), 1);
    }

    #[test]
    fn moving_wire_endpoint_updates_dependencies() {
        let mut graph = GraphModel::new("main");
        let a = graph.insert(node_with(&[Port::output("out")])).unwrap();
        let b = graph.insert(node_with(&[Port::input("in")])).unwrap();
        let c = graph.insert(node_with(&[Port::input("in")])).unwrap();
        let w = graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "in"))
            .unwrap();
        graph
            .set_wire_endpoints(w, Some(PortRef::new(a, "out")), Some(PortRef::new(c, "in")))
            .unwrap();
        assert!(graph.dependencies_of(b).is_empty());
        assert_eq!(graph.dependencies_of(c).len(), 1);
        assert_eq!(graph.wires_of(b).count(), 0);
    }

    #[test]
    fn prune_removes_unwired_ports() {
        let mut graph = GraphModel::new("main");
        let a = graph
            .insert(node_with(&[Port::output("out"), Port::output("spare")]))
            .unwrap();
        let b = graph.insert(node_with(&[Port::input("in")])).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "in"))
            .unwrap();
        assert!(graph.prune_disconnected_ports(a).unwrap());
        let ports = &graph.get(a).unwrap().as_node().unwrap().ports;
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].id, PortId::from("out"));
    }

    #[test]
    fn set_field_on_wire_is_wrong_category() {
        let mut graph = GraphModel::new("main");
        let w = graph
            .connect(
                PortRef::new(Guid::generate(), "o"),
                PortRef::new(Guid::generate(), "i"),
            )
            .unwrap();
        assert!(matches!(
            graph.set_field(w, "x", serde_json::json!(1)),
            Err(CoreError::WrongCategory { .. })
        ));
    }

    #[test]
    fn blocks_are_addressable_and_wireable() {
        let block = GraphElement::new(
            Guid::generate(),
            "BlockNodeModel",
            ElementCategory::BlockNode,
            ElementBody::Node(NodeData {
                ports: [Port::input("in")].into_iter().collect(),
                ..NodeData::default()
            }),
        )
        .unwrap();
        let block_guid = block.guid();
        let context = GraphElement::new(
            Guid::generate(),
            "ContextNodeModel",
            ElementCategory::ContextNode,
            ElementBody::Node(NodeData {
                blocks: vec![block],
                ..NodeData::default()
            }),
        )
        .unwrap();

        let mut graph = GraphModel::new("main");
        let ctx = graph.insert(context).unwrap();
        let a = graph.insert(node_with(&[Port::output("out")])).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(block_guid, "in"))
            .unwrap();
        assert_eq!(graph.get(block_guid).unwrap().category(), ElementCategory::BlockNode);
        assert_eq!(graph.dependencies_of(block_guid).len(), 1);

        graph.remove(ctx).unwrap();
        assert!(!graph.contains(block_guid));
        assert_eq!(graph.wires().count(), 0);
        assert!(graph.dependencies().is_empty());
    }

    #[test]
    fn removing_declaration_drops_portal_pairs() {
        let mut graph = GraphModel::new("main");
        let decl = graph
            .insert(
                GraphElement::new(
                    Guid::generate(),
                    "PortalDeclarationModel",
                    ElementCategory::PortalDeclaration,
                    ElementBody::PortalDeclaration(PortalDeclaration { name: "p".into() }),
                )
                .unwrap(),
            )
            .unwrap();
        for direction in [PortalDirection::Entry, PortalDirection::Exit] {
            graph
                .insert(
                    GraphElement::new(
                        Guid::generate(),
                        "NodeModel",
                        ElementCategory::Node,
                        ElementBody::Node(NodeData {
                            portal: Some(PortalLink {
                                declaration: decl,
                                direction,
                            }),
                            ..NodeData::default()
                        }),
                    )
                    .unwrap(),
                )
                .unwrap();
        }
        assert_eq!(graph.dependencies().len(), 1);
        graph.remove(decl).unwrap();
        assert!(graph.dependencies().is_empty());
    }
}
