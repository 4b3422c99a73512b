//! Derived dependency graph over linked nodes.
//!
//! Dependencies are never persisted. They are derived from two sources:
//! - **Wires** whose endpoints are both live ports of resolved nodes produce a
//!   [`LinkedNodesDependency`]. Parallel wires between the same port pair
//!   collapse into one entry with an incremented `count`.
//! - **Portal pairs**: every exit node depends on every entry node sharing a
//!   resolved portal declaration ([`PortalNodesDependency`]).
//!
//! [`GraphModel`](crate::graph::GraphModel) drives the incremental update
//! hooks inside the same mutation that changes connectivity, so queries always
//! observe current state. Incremental maintenance must agree with
//! [`DependencyGraph::build`] at all times. Cycles are legal and tolerated.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use tracing::debug;

use crate::element::{ElementCategory, PortalDirection};
use crate::graph::{ElementStore, GraphModel};
use crate::id::{Guid, PortRef};

/// A dependent node depends on a parent node through port-to-port wires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LinkedNodesDependency {
    /// Input port on the dependent node.
    pub dependent_port: PortRef,
    /// Output port on the parent node.
    pub parent_port: PortRef,
    /// Number of wires between this port pair.
    pub count: u32,
}

/// Implicit dependency of a portal exit on a portal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortalNodesDependency {
    /// The exit node.
    pub dependent_node: Guid,
    /// The entry node feeding it.
    pub parent_node: Guid,
}

/// A derived dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    Linked(LinkedNodesDependency),
    Portal(PortalNodesDependency),
}

impl Dependency {
    pub fn dependent_node(&self) -> Guid {
        match self {
            Dependency::Linked(d) => d.dependent_port.node,
            Dependency::Portal(d) => d.dependent_node,
        }
    }

    pub fn parent_node(&self) -> Guid {
        match self {
            Dependency::Linked(d) => d.parent_port.node,
            Dependency::Portal(d) => d.parent_node,
        }
    }

    /// Wire multiplicity; portal dependencies always count once.
    pub fn count(&self) -> u32 {
        match self {
            Dependency::Linked(d) => d.count,
            Dependency::Portal(_) => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DependencyKey {
    Linked {
        dependent_port: PortRef,
        parent_port: PortRef,
    },
    Portal {
        dependent: Guid,
        parent: Guid,
    },
}

impl DependencyKey {
    fn dependent(&self) -> Guid {
        match self {
            DependencyKey::Linked { dependent_port, .. } => dependent_port.node,
            DependencyKey::Portal { dependent, .. } => *dependent,
        }
    }

    fn parent(&self) -> Guid {
        match self {
            DependencyKey::Linked { parent_port, .. } => parent_port.node,
            DependencyKey::Portal { parent, .. } => *parent,
        }
    }
}

/// Dependency edges indexed from both sides.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<DependencyKey, Dependency>,
    /// Parent node -> keys of edges where it is the parent, insertion order.
    dependents: HashMap<Guid, IndexSet<DependencyKey>>,
    /// Dependent node -> keys of edges where it is the dependent.
    dependencies: HashMap<Guid, IndexSet<DependencyKey>>,
    /// Wires currently contributing to a linked dependency.
    counted_wires: HashMap<Guid, DependencyKey>,
    /// Portal declaration -> portal nodes referencing it.
    portal_members: HashMap<Guid, IndexSet<Guid>>,
    /// Portal declaration -> keys of the edges it produced.
    portal_edges: HashMap<Guid, Vec<DependencyKey>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the dependency graph from scratch.
    pub fn build(graph: &GraphModel) -> Self {
        Self::build_from(graph.store())
    }

    pub(crate) fn build_from(store: &ElementStore) -> Self {
        let mut deps = DependencyGraph::new();
        let mut declarations = IndexSet::new();
        for (guid, element) in &store.elements {
            if element.category() == ElementCategory::Wire {
                deps.wire_added(store, *guid);
            }
            if let Some(link) = element.portal_link() {
                deps.portal_members
                    .entry(link.declaration)
                    .or_default()
                    .insert(*guid);
                declarations.insert(link.declaration);
            }
        }
        for declaration in declarations {
            deps.refresh_portal(store, declaration);
        }
        deps
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Dependencies in which `node` is the parent, in insertion order.
    pub fn dependents_of(&self, node: Guid) -> Vec<&Dependency> {
        self.collect(self.dependents.get(&node))
    }

    /// Dependencies in which `node` is the dependent, in insertion order.
    pub fn dependencies_of(&self, node: Guid) -> Vec<&Dependency> {
        self.collect(self.dependencies.get(&node))
    }

    /// Every edge, unordered.
    pub fn edge_set(&self) -> HashSet<&Dependency> {
        self.edges.values().collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of wires contributing to linked dependencies.
    pub fn counted_wire_count(&self) -> usize {
        self.counted_wires.len()
    }

    /// Nodes transitively affected by an edit of `node`, breadth first.
    pub fn affected_by(&self, node: Guid) -> Vec<Guid> {
        let mut visited = HashSet::from([node]);
        let mut queue = VecDeque::from([node]);
        let mut affected = Vec::new();
        while let Some(current) = queue.pop_front() {
            if let Some(keys) = self.dependents.get(&current) {
                for key in keys {
                    let dependent = key.dependent();
                    if visited.insert(dependent) {
                        affected.push(dependent);
                        queue.push_back(dependent);
                    }
                }
            }
        }
        affected
    }

    /// Strongly connected components ordered parents-first.
    ///
    /// `nodes` seeds the order so that unconnected nodes are included and the
    /// result is deterministic. Cycles come out as multi-node components.
    pub fn processing_order(&self, nodes: impl IntoIterator<Item = Guid>) -> Vec<Vec<Guid>> {
        let mut graph = DiGraphMap::<Guid, ()>::new();
        for node in nodes {
            graph.add_node(node);
        }
        let seeded: Vec<Guid> = graph.nodes().collect();
        for parent in seeded {
            if let Some(keys) = self.dependents.get(&parent) {
                for key in keys {
                    graph.add_edge(parent, key.dependent(), ());
                }
            }
        }
        // tarjan_scc yields components in reverse topological order.
        let mut components = tarjan_scc(&graph);
        components.reverse();
        components
    }

    fn collect(&self, keys: Option<&IndexSet<DependencyKey>>) -> Vec<&Dependency> {
        keys.map(|keys| keys.iter().filter_map(|k| self.edges.get(k)).collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Incremental maintenance
    // -----------------------------------------------------------------------

    /// Counts `wire` if both of its endpoints are live ports. Idempotent.
    pub(crate) fn wire_added(&mut self, store: &ElementStore, wire: Guid) {
        if self.counted_wires.contains_key(&wire) {
            return;
        }
        let Some(element) = store.get(wire) else {
            return;
        };
        if element.is_placeholder() {
            return;
        }
        let Some(data) = element.as_wire() else {
            return;
        };
        let (Some(from), Some(to)) = (&data.from, &data.to) else {
            return;
        };
        if !store.is_live_port(from) || !store.is_live_port(to) {
            return;
        }

        let key = DependencyKey::Linked {
            dependent_port: to.clone(),
            parent_port: from.clone(),
        };
        if let Some(Dependency::Linked(linked)) = self.edges.get_mut(&key) {
            linked.count += 1;
        } else {
            self.insert_edge(
                key.clone(),
                Dependency::Linked(LinkedNodesDependency {
                    dependent_port: to.clone(),
                    parent_port: from.clone(),
                    count: 1,
                }),
            );
        }
        debug!(%wire, parent = %from, dependent = %to, "wire counted");
        self.counted_wires.insert(wire, key);
    }

    /// Uncounts `wire`, dropping the dependency when its count reaches zero.
    pub(crate) fn wire_removed(&mut self, wire: Guid) {
        let Some(key) = self.counted_wires.remove(&wire) else {
            return;
        };
        if let Some(Dependency::Linked(linked)) = self.edges.get_mut(&key) {
            if linked.count > 1 {
                linked.count -= 1;
                return;
            }
        }
        self.remove_edge(&key);
        debug!(%wire, "wire uncounted");
    }

    /// Registers a portal node and recomputes its declaration's pairs.
    pub(crate) fn portal_member_added(&mut self, store: &ElementStore, node: Guid) {
        let Some(declaration) = store
            .get(node)
            .and_then(|e| e.portal_link())
            .map(|l| l.declaration)
        else {
            return;
        };
        self.portal_members
            .entry(declaration)
            .or_default()
            .insert(node);
        self.refresh_portal(store, declaration);
    }

    /// Drops every edge touching a removed node.
    ///
    /// `portal` is the declaration the node was linked to, if any. A removed
    /// portal declaration is handled too: its pairs disappear.
    pub(crate) fn node_removed(&mut self, store: &ElementStore, node: Guid, portal: Option<Guid>) {
        let keys: Vec<DependencyKey> = self
            .dependents
            .get(&node)
            .into_iter()
            .chain(self.dependencies.get(&node))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        for key in &keys {
            self.remove_edge(key);
        }
        self.counted_wires
            .retain(|_, key| key.dependent() != node && key.parent() != node);

        if let Some(declaration) = portal {
            if let Some(members) = self.portal_members.get_mut(&declaration) {
                members.shift_remove(&node);
                if members.is_empty() {
                    self.portal_members.remove(&declaration);
                }
            }
            self.refresh_portal(store, declaration);
        }
        if self.portal_members.contains_key(&node) || self.portal_edges.contains_key(&node) {
            self.refresh_portal(store, node);
        }
    }

    /// Moves portal membership from a placeholder declaration to its
    /// resolved replacement.
    pub(crate) fn rekey_portal_declaration(&mut self, old: Guid, new: Guid) {
        if let Some(keys) = self.portal_edges.remove(&old) {
            for key in &keys {
                self.remove_edge(key);
            }
        }
        if let Some(members) = self.portal_members.remove(&old) {
            self.portal_members.entry(new).or_default().extend(members);
        }
    }

    /// Recomputes every portal pair of `declaration`.
    pub(crate) fn refresh_portal(&mut self, store: &ElementStore, declaration: Guid) {
        if let Some(keys) = self.portal_edges.remove(&declaration) {
            for key in &keys {
                self.remove_edge(key);
            }
        }

        let declaration_live = store.get(declaration).is_some_and(|d| {
            !d.is_placeholder() && d.category() == ElementCategory::PortalDeclaration
        });
        if !declaration_live {
            return;
        }
        let Some(members) = self.portal_members.get(&declaration) else {
            return;
        };

        let mut entries = Vec::new();
        let mut exits = Vec::new();
        for member in members {
            let Some(element) = store.get(*member) else {
                continue;
            };
            if element.is_placeholder() {
                continue;
            }
            match element.portal_link() {
                Some(link) if link.declaration == declaration => match link.direction {
                    PortalDirection::Entry => entries.push(*member),
                    PortalDirection::Exit => exits.push(*member),
                },
                _ => {}
            }
        }

        let mut keys = Vec::new();
        for exit in &exits {
            for entry in &entries {
                let key = DependencyKey::Portal {
                    dependent: *exit,
                    parent: *entry,
                };
                if self.edges.contains_key(&key) {
                    continue;
                }
                self.insert_edge(
                    key.clone(),
                    Dependency::Portal(PortalNodesDependency {
                        dependent_node: *exit,
                        parent_node: *entry,
                    }),
                );
                keys.push(key);
            }
        }
        if !keys.is_empty() {
            debug!(%declaration, pairs = keys.len(), "portal pairs refreshed");
            self.portal_edges.insert(declaration, keys);
        }
    }

    fn insert_edge(&mut self, key: DependencyKey, dependency: Dependency) {
        self.dependents
            .entry(key.parent())
            .or_default()
            .insert(key.clone());
        self.dependencies
            .entry(key.dependent())
            .or_default()
            .insert(key.clone());
        self.edges.insert(key, dependency);
    }

    fn remove_edge(&mut self, key: &DependencyKey) {
        if self.edges.remove(key).is_none() {
            return;
        }
        if let Some(keys) = self.dependents.get_mut(&key.parent()) {
            keys.shift_remove(key);
            if keys.is_empty() {
                self.dependents.remove(&key.parent());
            }
        }
        if let Some(keys) = self.dependencies.get_mut(&key.dependent()) {
            keys.shift_remove(key);
            if keys.is_empty() {
                self.dependencies.remove(&key.dependent());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{
        ElementBody, GraphElement, NodeData, Port, PortalDeclaration, PortalLink,
    };

    fn node(ports: &[Port]) -> GraphElement {
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

    fn math_node() -> GraphElement {
        node(&[Port::input("a"), Port::input("b"), Port::output("out")])
    }

    fn portal_node(declaration: Guid, direction: PortalDirection) -> GraphElement {
        GraphElement::new(
            Guid::generate(),
            "NodeModel",
            ElementCategory::Node,
            ElementBody::Node(NodeData {
                portal: Some(PortalLink {
                    declaration,
                    direction,
                }),
                ..NodeData::default()
            }),
        )
        .unwrap()
    }

    fn portal_declaration() -> GraphElement {
        GraphElement::new(
            Guid::generate(),
            "PortalDeclarationModel",
            ElementCategory::PortalDeclaration,
            ElementBody::PortalDeclaration(PortalDeclaration { name: "p".into() }),
        )
        .unwrap()
    }

    #[test]
    fn single_wire_creates_linked_dependency() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();

        let dependents = graph.dependents_of(a);
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].dependent_node(), b);
        assert_eq!(dependents[0].parent_node(), a);
        assert_eq!(dependents[0].count(), 1);
        assert_eq!(graph.dependencies_of(b), dependents);
        assert!(graph.dependencies_of(a).is_empty());
    }

    #[test]
    fn parallel_wires_collapse_with_count() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        let w1 = graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        assert_eq!(graph.dependencies().len(), 1);
        assert_eq!(graph.dependents_of(a)[0].count(), 2);

        graph.remove(w1).unwrap();
        assert_eq!(graph.dependents_of(a)[0].count(), 1);
    }

    #[test]
    fn distinct_port_pairs_stay_distinct() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "b"))
            .unwrap();
        assert_eq!(graph.dependents_of(a).len(), 2);
    }

    #[test]
    fn wire_to_missing_port_is_not_counted() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "nope"), PortRef::new(b, "a"))
            .unwrap();
        assert!(graph.dependencies().is_empty());
    }

    #[test]
    fn portal_pairs_link_exit_to_entry() {
        let mut graph = GraphModel::new("g");
        let decl = graph.insert(portal_declaration()).unwrap();
        let entry = graph
            .insert(portal_node(decl, PortalDirection::Entry))
            .unwrap();
        let exit1 = graph.insert(portal_node(decl, PortalDirection::Exit)).unwrap();
        let exit2 = graph.insert(portal_node(decl, PortalDirection::Exit)).unwrap();

        let dependents: Vec<Guid> = graph
            .dependents_of(entry)
            .iter()
            .map(|d| d.dependent_node())
            .collect();
        assert_eq!(dependents, vec![exit1, exit2]);
        assert!(matches!(
            graph.dependencies_of(exit1)[0],
            Dependency::Portal(PortalNodesDependency { parent_node, .. }) if *parent_node == entry
        ));
    }

    #[test]
    fn portal_without_declaration_has_no_pairs() {
        let mut graph = GraphModel::new("g");
        let decl = Guid::generate();
        graph
            .insert(portal_node(decl, PortalDirection::Entry))
            .unwrap();
        graph.insert(portal_node(decl, PortalDirection::Exit)).unwrap();
        assert!(graph.dependencies().is_empty());
    }

    #[test]
    fn removing_node_drops_all_its_edges() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        let c = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(b, "out"), PortRef::new(c, "a"))
            .unwrap();

        graph.remove(b).unwrap();
        assert!(graph.dependencies().is_empty());
        assert!(graph.dependents_of(a).is_empty());
        assert!(graph.dependencies_of(c).is_empty());
        assert_eq!(graph.wires().count(), 0);
    }

    #[test]
    fn cycles_are_tolerated() {
        let mut graph = GraphModel::new("g");
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        let c = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(b, "out"), PortRef::new(a, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(b, "out"), PortRef::new(c, "a"))
            .unwrap();

        let mut affected = graph.dependencies().affected_by(a);
        affected.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(affected, expected);

        let order = graph.processing_order();
        assert_eq!(order.len(), 2);
        let mut cycle = order[0].clone();
        cycle.sort();
        let mut ab = vec![a, b];
        ab.sort();
        assert_eq!(cycle, ab);
        assert_eq!(order[1], vec![c]);
    }

    #[test]
    fn processing_order_puts_parents_first() {
        let mut graph = GraphModel::new("g");
        let c = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        let a = graph.insert(math_node()).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(b, "out"), PortRef::new(c, "a"))
            .unwrap();
        let order: Vec<Guid> = graph.processing_order().into_iter().flatten().collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn linked_dependency_json() {
        let dependency = Dependency::Linked(LinkedNodesDependency {
            dependent_port: PortRef::new(Guid::from_u128(2), "a"),
            parent_port: PortRef::new(Guid::from_u128(1), "out"),
            count: 2,
        });
        insta::assert_json_snapshot!(dependency, @r#"
        {
          "kind": "linked",
          "dependent_port": {
            "node": "00000000-0000-0000-0000-000000000002",
            "port": "a"
          },
          "parent_port": {
            "node": "00000000-0000-0000-0000-000000000001",
            "port": "out"
          },
          "count": 2
        }
        "#);
    }

    #[test]
    fn build_matches_incremental() {
        let mut graph = GraphModel::new("g");
        let decl = graph.insert(portal_declaration()).unwrap();
        let a = graph.insert(math_node()).unwrap();
        let b = graph.insert(math_node()).unwrap();
        graph
            .insert(portal_node(decl, PortalDirection::Entry))
            .unwrap();
        graph.insert(portal_node(decl, PortalDirection::Exit)).unwrap();
        let w = graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "b"))
            .unwrap();
        graph.remove(w).unwrap();

        let rebuilt = DependencyGraph::build(&graph);
        assert_eq!(rebuilt.edge_set(), graph.dependencies().edge_set());
    }
}
