//! Current marker state of one open graph.

use nodegraph_core::graph::GraphModel;
use nodegraph_core::id::Guid;
use tracing::debug;

use super::{aggregate, Marker, MarkerSet, RawDiagnostic};

/// Holds the markers of the latest processing run.
///
/// Each batch replaces the previous marker set wholesale; nothing is merged.
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    current: MarkerSet,
    generation: u64,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates `batch` against `graph` and makes it the current state.
    pub fn apply_batch(
        &mut self,
        graph: &GraphModel,
        batch: impl IntoIterator<Item = RawDiagnostic>,
    ) -> &MarkerSet {
        self.current = aggregate(graph, batch);
        self.generation += 1;
        debug!(
            generation = self.generation,
            markers = self.current.len(),
            dropped = self.current.dropped().len(),
            "marker batch applied"
        );
        &self.current
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.current
    }

    pub fn marker_for(&self, element: Guid) -> Option<&Marker> {
        self.current.get(element)
    }

    /// Number of batches applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` while any marker has error severity.
    pub fn has_errors(&self) -> bool {
        self.current.has_errors()
    }

    pub fn clear(&mut self) {
        self.current = MarkerSet::default();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use nodegraph_core::element::{ElementBody, ElementCategory, GraphElement, NodeData};

    fn graph() -> (GraphModel, Guid) {
        let mut graph = GraphModel::new("main");
        let node = graph
            .insert(
                GraphElement::new(
                    Guid::generate(),
                    "NodeModel",
                    ElementCategory::Node,
                    ElementBody::Node(NodeData::default()),
                )
                .unwrap(),
            )
            .unwrap();
        (graph, node)
    }

    #[test]
    fn new_batch_replaces_previous() {
        let (graph, node) = graph();
        let mut store = MarkerStore::new();
        store.apply_batch(
            &graph,
            vec![RawDiagnostic::new(node, graph.guid(), Severity::Error, "bad")],
        );
        assert!(store.has_errors());
        assert_eq!(store.generation(), 1);

        store.apply_batch(
            &graph,
            vec![RawDiagnostic::new(node, graph.guid(), Severity::Log, "fine")],
        );
        assert!(!store.has_errors());
        assert_eq!(store.marker_for(node).unwrap().message(), "fine");
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn markers_for_deleted_elements_disappear_on_next_batch() {
        let (mut graph, node) = graph();
        let mut store = MarkerStore::new();
        store.apply_batch(
            &graph,
            vec![RawDiagnostic::new(node, graph.guid(), Severity::Warning, "w")],
        );
        graph.remove(node).unwrap();
        let set = store.apply_batch(
            &graph,
            vec![RawDiagnostic::new(node, graph.guid(), Severity::Warning, "w")],
        );
        assert!(set.is_empty());
        assert_eq!(set.dropped().len(), 1);
    }

    #[test]
    fn clear_empties_markers() {
        let (graph, node) = graph();
        let mut store = MarkerStore::new();
        store.apply_batch(
            &graph,
            vec![RawDiagnostic::new(node, graph.guid(), Severity::Error, "bad")],
        );
        store.clear();
        assert!(store.markers().is_empty());
        assert!(!store.has_errors());
    }
}
