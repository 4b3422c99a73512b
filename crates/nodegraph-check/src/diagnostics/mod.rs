//! Aggregation of processing diagnostics into per-element markers.
//!
//! [`aggregate`] consumes one complete diagnostic batch for a graph:
//! - diagnostics naming another graph, or an element that no longer exists,
//!   are dropped and reported with a [`DropReason`];
//! - the rest are grouped by source element in delivery order;
//! - a group of one becomes a [`Marker::Single`] carrying the diagnostic
//!   verbatim, larger groups become a [`Marker::Multiple`] whose severity is
//!   the maximum of its children.
//!
//! The function is pure. Identical input yields identical output.

pub mod marker;
pub mod raw;
pub mod store;

pub use marker::{multiple_issues_message, ErrorMarker, Marker, MultipleErrorsMarker};
pub use raw::{GraphReference, QuickFix, RawDiagnostic, Severity};
pub use store::MarkerStore;

use indexmap::IndexMap;
use nodegraph_core::graph::GraphModel;
use nodegraph_core::id::Guid;
use serde::Serialize;
use tracing::warn;

/// Why a diagnostic did not produce a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The source element was deleted before the batch arrived.
    #[error("source element no longer exists")]
    StaleElement,
    /// The diagnostic was produced for a different graph.
    #[error("diagnostic belongs to another graph")]
    ForeignGraph,
}

/// A diagnostic that was discarded during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedDiagnostic {
    pub diagnostic: RawDiagnostic,
    pub reason: DropReason,
}

/// Markers for one graph plus the diagnostics that were dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerSet {
    markers: IndexMap<Guid, Marker>,
    dropped: Vec<DroppedDiagnostic>,
}

impl MarkerSet {
    /// Marker on `element`, if any.
    pub fn get(&self, element: Guid) -> Option<&Marker> {
        self.markers.get(&element)
    }

    /// Markers in order of each element's first diagnostic.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn dropped(&self) -> &[DroppedDiagnostic] {
        &self.dropped
    }

    /// Worst severity over all markers.
    pub fn max_severity(&self) -> Option<Severity> {
        self.markers.values().map(Marker::severity).max()
    }

    pub fn has_errors(&self) -> bool {
        self.max_severity() == Some(Severity::Error)
    }

    /// One line per marker followed by a dropped count, for plain-text output.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self.markers.values().map(|m| m.to_string()).collect();
        lines.push(format!("{} marker(s), {} dropped", self.len(), self.dropped.len()));
        lines.join("\n")
    }
}

/// Groups one diagnostic batch into markers for `graph`.
pub fn aggregate(graph: &GraphModel, batch: impl IntoIterator<Item = RawDiagnostic>) -> MarkerSet {
    let mut groups: IndexMap<Guid, Vec<RawDiagnostic>> = IndexMap::new();
    let mut dropped = Vec::new();

    for diagnostic in batch {
        let reason = if diagnostic.graph.0 != graph.guid() {
            Some(DropReason::ForeignGraph)
        } else if !graph.contains(diagnostic.source) {
            Some(DropReason::StaleElement)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                warn!(source = %diagnostic.source, %reason, "dropping diagnostic");
                dropped.push(DroppedDiagnostic { diagnostic, reason });
            }
            None => groups
                .entry(diagnostic.source)
                .or_default()
                .push(diagnostic),
        }
    }

    let markers = groups
        .into_iter()
        .map(|(element, mut group)| {
            let marker = if group.len() == 1 {
                Marker::Single(ErrorMarker::from(group.remove(0)))
            } else {
                let children = group.into_iter().map(ErrorMarker::from).collect();
                Marker::Multiple(MultipleErrorsMarker::roll_up(element, children))
            };
            (element, marker)
        })
        .collect();

    MarkerSet { markers, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_core::element::{ElementBody, ElementCategory, GraphElement, NodeData};

    fn graph_with_nodes(count: u128) -> GraphModel {
        let mut graph = GraphModel::with_guid(Guid::from_u128(100), "main");
        for i in 1..=count {
            graph
                .insert(
                    GraphElement::new(
                        Guid::from_u128(i),
                        "NodeModel",
                        ElementCategory::Node,
                        ElementBody::Node(NodeData::default()),
                    )
                    .unwrap(),
                )
                .unwrap();
        }
        graph
    }

    fn diag(source: u128, severity: Severity, message: &str) -> RawDiagnostic {
        RawDiagnostic::new(Guid::from_u128(source), Guid::from_u128(100), severity, message)
    }

    #[test]
    fn single_diagnostic_is_verbatim() {
        let graph = graph_with_nodes(1);
        let set = aggregate(&graph, vec![diag(1, Severity::Warning, "unused output")]);
        let marker = set.get(Guid::from_u128(1)).unwrap();
        assert!(matches!(marker, Marker::Single(_)));
        assert_eq!(marker.message(), "unused output");
        assert_eq!(marker.severity(), Severity::Warning);
    }

    #[test]
    fn group_rolls_up_to_error() {
        let graph = graph_with_nodes(1);
        let set = aggregate(
            &graph,
            vec![
                diag(1, Severity::Warning, "a"),
                diag(1, Severity::Error, "b"),
                diag(1, Severity::Log, "c"),
            ],
        );
        let marker = set.get(Guid::from_u128(1)).unwrap();
        assert_eq!(marker.severity(), Severity::Error);
        assert_eq!(marker.message(), "There are 3 issues. Click the badge to see more.");
        let messages: Vec<&str> = marker.children().iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
        assert!(set.has_errors());
    }

    #[test]
    fn children_keep_their_context_paths() {
        let graph = graph_with_nodes(3);
        let root = Guid::from_u128(100);
        let set = aggregate(
            &graph,
            vec![
                diag(3, Severity::Warning, "a").with_context([root, Guid::from_u128(1), Guid::from_u128(3)]),
                diag(3, Severity::Error, "b").with_context([root, Guid::from_u128(2), Guid::from_u128(3)]),
            ],
        );
        let marker = set.get(Guid::from_u128(3)).unwrap();
        assert!(matches!(marker, Marker::Multiple(_)));
        let paths: Vec<&[Guid]> = marker.children().iter().map(|c| c.context.as_slice()).collect();
        assert_eq!(
            paths,
            vec![
                &[root, Guid::from_u128(1), Guid::from_u128(3)][..],
                &[root, Guid::from_u128(2), Guid::from_u128(3)][..],
            ]
        );
    }

    #[test]
    fn stale_and_foreign_diagnostics_are_dropped() {
        let graph = graph_with_nodes(1);
        let foreign = RawDiagnostic::new(
            Guid::from_u128(1),
            Guid::from_u128(999),
            Severity::Error,
            "elsewhere",
        );
        let set = aggregate(
            &graph,
            vec![diag(7, Severity::Error, "deleted"), foreign, diag(1, Severity::Log, "ok")],
        );
        assert_eq!(set.len(), 1);
        let reasons: Vec<DropReason> = set.dropped().iter().map(|d| d.reason).collect();
        assert_eq!(reasons, vec![DropReason::StaleElement, DropReason::ForeignGraph]);
        assert!(!set.has_errors());
    }

    #[test]
    fn markers_follow_first_occurrence_order() {
        let graph = graph_with_nodes(3);
        let set = aggregate(
            &graph,
            vec![
                diag(3, Severity::Log, "x"),
                diag(1, Severity::Log, "y"),
                diag(3, Severity::Log, "z"),
            ],
        );
        let order: Vec<Guid> = set.iter().map(Marker::element).collect();
        assert_eq!(order, vec![Guid::from_u128(3), Guid::from_u128(1)]);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let graph = graph_with_nodes(2);
        let batch = vec![
            diag(2, Severity::Warning, "w1"),
            diag(1, Severity::Error, "e"),
            diag(2, Severity::Warning, "w2"),
        ];
        assert_eq!(aggregate(&graph, batch.clone()), aggregate(&graph, batch));
    }

    #[test]
    fn empty_batch_yields_empty_set() {
        let graph = graph_with_nodes(1);
        let set = aggregate(&graph, Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.max_severity(), None);
    }

    #[test]
    fn summary_text() {
        let graph = graph_with_nodes(2);
        let set = aggregate(
            &graph,
            vec![
                diag(1, Severity::Warning, "unused output"),
                diag(2, Severity::Log, "a"),
                diag(2, Severity::Error, "b"),
                diag(9, Severity::Error, "gone"),
            ],
        );
        insta::assert_snapshot!(set.summary(), @r"
        [warning] 00000000-0000-0000-0000-000000000001: unused output
        [error] 00000000-0000-0000-0000-000000000002: There are 2 issues. Click the badge to see more.
        2 marker(s), 1 dropped
        ");
    }
}
