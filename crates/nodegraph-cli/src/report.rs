//! Plain-text renderings of load results, dependencies and resave outcomes.

use std::fmt::Write as _;

use nodegraph_core::dependency::Dependency;
use nodegraph_core::graph::GraphModel;
use nodegraph_core::id::Guid;
use nodegraph_storage::convert::{LoadAnomaly, LoadedDocument, ReferenceKind};
use nodegraph_storage::dirty::DirtyRegions;

pub fn render_inspect(loaded: &LoadedDocument) -> String {
    let graph = &loaded.graph;
    let mut out = String::new();
    let _ = writeln!(out, "graph {} ({})", graph.name(), graph.guid());
    let _ = writeln!(
        out,
        "elements: {} ({} nodes, {} wires)",
        graph.len(),
        graph.nodes().count(),
        graph.wires().count()
    );

    let placeholders: Vec<_> = graph.placeholders().collect();
    let _ = writeln!(out, "placeholders: {}", placeholders.len());
    for element in placeholders {
        let _ = writeln!(
            out,
            "  {} {} [{}]",
            element.guid(),
            element.type_name(),
            element.category()
        );
    }

    let _ = writeln!(out, "anomalies: {}", loaded.report.anomalies.len());
    for anomaly in &loaded.report.anomalies {
        let _ = writeln!(out, "  {}", describe_anomaly(anomaly));
    }
    let _ = write!(out, "dependencies: {}", graph.dependencies().len());
    out
}

fn describe_anomaly(anomaly: &LoadAnomaly) -> String {
    match anomaly {
        LoadAnomaly::UnresolvedType {
            guid, type_name, ..
        } => format!("{}: unknown type '{}'", guid, type_name),
        LoadAnomaly::IncompatiblePayload {
            guid,
            type_name,
            reason,
        } => format!("{}: payload does not fit '{}': {}", guid, type_name, reason),
        LoadAnomaly::DanglingReference {
            element,
            target,
            reference,
        } => {
            let what = match reference {
                ReferenceKind::WireEndpoint => "wire endpoint",
                ReferenceKind::VariableDeclaration => "variable declaration",
                ReferenceKind::PortalDeclaration => "portal declaration",
            };
            format!("{}: dangling {} {}", element, what, target)
        }
        LoadAnomaly::DuplicateGuid { guid } => format!("{}: duplicate guid, skipped", guid),
    }
}

/// Processing order followed by each node's incoming dependencies.
///
/// With `focus`, only the nodes affected by an edit of that node are listed.
pub fn render_dependencies(graph: &GraphModel, focus: Option<Guid>) -> String {
    let mut out = String::new();
    let order = graph.processing_order();
    let affected = focus.map(|node| {
        let mut nodes = graph.dependencies().affected_by(node);
        nodes.push(node);
        nodes
    });

    for (step, component) in order.iter().enumerate() {
        for node in component {
            if affected.as_ref().is_some_and(|a| !a.contains(node)) {
                continue;
            }
            let cyclic = if component.len() > 1 { " (cycle)" } else { "" };
            let _ = writeln!(out, "{}. {}{}", step + 1, node, cyclic);
            for dependency in graph.dependencies_of(*node) {
                let _ = writeln!(out, "   <- {}", describe_dependency(dependency));
            }
        }
    }
    let _ = write!(out, "{} dependency edge(s)", graph.dependencies().len());
    out
}

fn describe_dependency(dependency: &Dependency) -> String {
    match dependency {
        Dependency::Linked(linked) => format!(
            "{} -> {} x{}",
            linked.parent_port, linked.dependent_port, linked.count
        ),
        Dependency::Portal(portal) => format!("portal {}", portal.parent_node),
    }
}

pub fn render_resave(loaded: &LoadedDocument, regions: &DirtyRegions) -> String {
    format!(
        "{} added, {} modified, {} removed; {} placeholder(s) kept",
        regions.added.len(),
        regions.modified.len(),
        regions.removed.len(),
        loaded.placeholders.len()
    )
}
