//! Decompose/recompose conversions between GraphModel and stored documents.
//!
//! [`decompose`] writes a [`GraphModel`] as a [`StoredDocument`]. Resolved
//! elements are encoded from their bodies; placeholders write back their
//! retained payload bytes unchanged.
//!
//! [`recompose`] is the two-pass load:
//! 1. Every stored element, in document order, is resolved through the
//!    [`TypeRegistry`] and built with the [`ElementFactory`]. Unknown types,
//!    category changes and payloads that no longer decode into the live shape
//!    all degrade to placeholders, both for top-level elements and for the
//!    blocks of a resolved context node. Top-level placeholders keep the
//!    stored reference id; blocks, and elements whose stored id is already
//!    taken, get ids past the largest stored one.
//! 2. Cross references (wire endpoints, variable and portal declarations) are
//!    checked by GUID against the assembled graph.
//!
//! Neither pass fails. Anomalies are collected in a [`LoadReport`].

use std::collections::HashMap;

use nodegraph_core::element::{decode_body, encode_body, ElementCategory, GraphElement, SerializedPayload};
use nodegraph_core::factory::ElementFactory;
use nodegraph_core::graph::GraphModel;
use nodegraph_core::id::{Guid, ReferenceId};
use nodegraph_core::placeholder::{PlaceholderRegistry, SubstitutedBlock, SubstitutionReason};
use nodegraph_core::type_registry::TypeRegistry;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::info;

use crate::document::{StoredDocument, StoredElement, FORMAT_VERSION};
use crate::error::StorageError;
use crate::hash::fingerprint_document;

/// Which kind of cross reference failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    WireEndpoint,
    VariableDeclaration,
    PortalDeclaration,
}

/// A recoverable problem found while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadAnomaly {
    /// The type identifier did not resolve; a placeholder was substituted.
    UnresolvedType {
        guid: Guid,
        type_name: String,
        category: ElementCategory,
    },
    /// The type resolved but the payload no longer fits it; a placeholder
    /// was substituted.
    IncompatiblePayload {
        guid: Guid,
        type_name: String,
        reason: String,
    },
    /// A reference names an element that is not in the graph.
    DanglingReference {
        element: Guid,
        target: Guid,
        reference: ReferenceKind,
    },
    /// A later element reused a GUID and was skipped.
    DuplicateGuid { guid: Guid },
}

/// Anomalies accumulated over one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub anomalies: Vec<LoadAnomaly>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Number of elements that were loaded as placeholders.
    pub fn placeholder_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    LoadAnomaly::UnresolvedType { .. } | LoadAnomaly::IncompatiblePayload { .. }
                )
            })
            .count()
    }

    fn push(&mut self, anomaly: LoadAnomaly) {
        self.anomalies.push(anomaly);
    }
}

/// Result of [`recompose`].
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub graph: GraphModel,
    pub placeholders: PlaceholderRegistry,
    pub report: LoadReport,
    /// blake3 fingerprints of the stored elements as loaded.
    pub fingerprints: HashMap<Guid, blake3::Hash>,
}

/// Writes `graph` as a stored document.
pub fn decompose(graph: &GraphModel) -> Result<StoredDocument, StorageError> {
    let elements = graph
        .elements()
        .enumerate()
        .map(|(index, element)| stored_element(index, element))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StoredDocument {
        format_version: FORMAT_VERSION,
        graph: graph.guid(),
        name: graph.name().to_string(),
        elements,
    })
}

fn stored_element(index: usize, element: &GraphElement) -> Result<StoredElement, StorageError> {
    let bytes = match element.placeholder() {
        Some(metadata) => metadata.payload.as_bytes().to_vec(),
        None => encode_body(element.body())?,
    };
    let text = String::from_utf8(bytes).map_err(|e| StorageError::InvalidPayload {
        guid: element.guid(),
        reason: e.to_string(),
    })?;
    Ok(StoredElement {
        type_name: element.type_name().to_string(),
        category: element.category(),
        guid: element.guid(),
        reference_id: ReferenceId(index as i64),
        payload: RawValue::from_string(text)?,
    })
}

/// Loads a stored document against `registry`.
pub fn recompose(document: &StoredDocument, registry: &TypeRegistry) -> LoadedDocument {
    let mut graph = GraphModel::with_guid(document.graph, &document.name);
    let mut placeholders = PlaceholderRegistry::new();
    let mut report = LoadReport::default();
    let factory = ElementFactory::new(registry);

    let mut next_reference = document
        .elements
        .iter()
        .map(|e| e.reference_id.0)
        .max()
        .map_or(0, |largest| largest + 1);
    let mut fresh_reference = || {
        let reference_id = ReferenceId(next_reference);
        next_reference += 1;
        reference_id
    };

    for stored in &document.elements {
        if graph.contains(stored.guid) {
            report.push(LoadAnomaly::DuplicateGuid { guid: stored.guid });
            continue;
        }
        let element = match instantiate(&factory, stored) {
            Ok(mut element) => {
                let blocks =
                    placeholders.substitute_blocks(&mut element, registry, &mut fresh_reference);
                report.anomalies.extend(blocks.into_iter().map(block_anomaly));
                element
            }
            Err(anomaly) => {
                report.push(anomaly);
                let reference_id = match placeholders.guid_for(stored.reference_id) {
                    Some(_) => fresh_reference(),
                    None => stored.reference_id,
                };
                placeholders.create_placeholder(
                    stored.category,
                    &stored.type_name,
                    stored.guid,
                    reference_id,
                    SerializedPayload::new(stored.payload_bytes()),
                )
            }
        };
        if graph.insert(element).is_err() {
            // Only a block GUID colliding with an earlier element gets here.
            report.push(LoadAnomaly::DuplicateGuid { guid: stored.guid });
        }
    }

    check_references(&graph, &mut report);
    info!(
        graph = %graph.guid(),
        elements = graph.len(),
        placeholders = placeholders.len(),
        anomalies = report.anomalies.len(),
        "document loaded"
    );
    LoadedDocument {
        graph,
        placeholders,
        report,
        fingerprints: fingerprint_document(document),
    }
}

fn block_anomaly(block: SubstitutedBlock) -> LoadAnomaly {
    match block.reason {
        SubstitutionReason::UnresolvedType => LoadAnomaly::UnresolvedType {
            guid: block.guid,
            type_name: block.type_name,
            category: block.category,
        },
        SubstitutionReason::CategoryChanged { category } => LoadAnomaly::IncompatiblePayload {
            guid: block.guid,
            type_name: block.type_name,
            reason: format!("type is now a {}, stored as {}", category, block.category),
        },
        SubstitutionReason::UndecodableBody => LoadAnomaly::IncompatiblePayload {
            guid: block.guid,
            type_name: block.type_name,
            reason: "block body no longer decodes".to_string(),
        },
    }
}

/// First pass for one element: resolve, decode and instantiate.
fn instantiate(factory: &ElementFactory<'_>, stored: &StoredElement) -> Result<GraphElement, LoadAnomaly> {
    let Some(descriptor) = factory.registry().resolve(&stored.type_name) else {
        return Err(LoadAnomaly::UnresolvedType {
            guid: stored.guid,
            type_name: stored.type_name.clone(),
            category: stored.category,
        });
    };
    let incompatible = |reason: String| LoadAnomaly::IncompatiblePayload {
        guid: stored.guid,
        type_name: stored.type_name.clone(),
        reason,
    };
    if descriptor.category() != stored.category {
        return Err(incompatible(format!(
            "type is now a {}, stored as {}",
            descriptor.category(),
            stored.category
        )));
    }
    let body = decode_body(stored.payload_bytes()).map_err(|e| incompatible(e.to_string()))?;
    let mut element = factory
        .instantiate_as(Some(descriptor), stored.category.base_type_name(), stored.guid)
        .map_err(|e| incompatible(e.to_string()))?;
    element
        .replace_body(body)
        .map_err(|e| incompatible(e.to_string()))?;
    Ok(element)
}

/// Second pass: every GUID reference must name an element in the graph.
fn check_references(graph: &GraphModel, report: &mut LoadReport) {
    for element in graph.elements() {
        if let Some(wire) = element.as_wire() {
            for endpoint in [&wire.from, &wire.to].into_iter().flatten() {
                if !graph.contains(endpoint.node) {
                    report.push(LoadAnomaly::DanglingReference {
                        element: element.guid(),
                        target: endpoint.node,
                        reference: ReferenceKind::WireEndpoint,
                    });
                }
            }
        }
        let Some(data) = element.as_node() else {
            continue;
        };
        for node in std::iter::once(element).chain(data.blocks.iter()) {
            let Some(node_data) = node.as_node() else {
                continue;
            };
            if let Some(variable) = node_data.variable {
                if !graph.contains(variable) {
                    report.push(LoadAnomaly::DanglingReference {
                        element: node.guid(),
                        target: variable,
                        reference: ReferenceKind::VariableDeclaration,
                    });
                }
            }
            if let Some(portal) = &node_data.portal {
                if !graph.contains(portal.declaration) {
                    report.push(LoadAnomaly::DanglingReference {
                        element: node.guid(),
                        target: portal.declaration,
                        reference: ReferenceKind::PortalDeclaration,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_core::element::{Capabilities, ElementBody, NodeData, Port};
    use nodegraph_core::id::PortRef;
    use nodegraph_core::type_registry::TypeDescriptor;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register(TypeDescriptor::new("Math.Add", ElementCategory::Node))
            .unwrap();
        reg
    }

    fn add_node(guid: Guid) -> GraphElement {
        GraphElement::new(
            guid,
            "Math.Add",
            ElementCategory::Node,
            ElementBody::Node(NodeData {
                title: "Add".into(),
                ports: [Port::input("a"), Port::output("out")].into_iter().collect(),
                ..NodeData::default()
            }),
        )
        .unwrap()
    }

    fn stored(guid: u128, type_name: &str, category: ElementCategory, payload: &str) -> StoredElement {
        StoredElement {
            type_name: type_name.into(),
            category,
            guid: Guid::from_u128(guid),
            reference_id: ReferenceId(0),
            payload: RawValue::from_string(payload.to_string()).unwrap(),
        }
    }

    #[test]
    fn decompose_then_recompose_keeps_graph() {
        let mut graph = GraphModel::new("main");
        let a = graph.insert(add_node(Guid::generate())).unwrap();
        let b = graph.insert(add_node(Guid::generate())).unwrap();
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "a"))
            .unwrap();

        let document = decompose(&graph).unwrap();
        assert_eq!(document.elements.len(), 3);
        assert_eq!(document.elements[2].reference_id, ReferenceId(2));

        let loaded = recompose(&document, &registry());
        assert!(loaded.report.is_clean());
        assert_eq!(loaded.graph.guid(), graph.guid());
        assert_eq!(loaded.graph.get(a), graph.get(a));
        assert_eq!(loaded.graph.dependencies_of(b).len(), 1);
    }

    #[test]
    fn unresolved_type_becomes_placeholder() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        document.elements.push(stored(1, "Gone.Node", ElementCategory::Node, r#"{"x": 1}"#));
        let loaded = recompose(&document, &registry());
        let element = loaded.graph.get(Guid::from_u128(1)).unwrap();
        assert!(element.is_placeholder());
        assert_eq!(loaded.placeholders.guid_for(ReferenceId(0)), Some(Guid::from_u128(1)));
        assert_eq!(loaded.report.placeholder_count(), 1);
        assert!(matches!(
            loaded.report.anomalies[0],
            LoadAnomaly::UnresolvedType { .. }
        ));
    }

    #[test]
    fn retyped_payload_becomes_placeholder() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        document.elements.push(stored(
            1,
            "Math.Add",
            ElementCategory::Node,
            r#"{"node":{"title":42}}"#,
        ));
        let loaded = recompose(&document, &registry());
        assert!(loaded.graph.get(Guid::from_u128(1)).unwrap().is_placeholder());
        assert!(matches!(
            loaded.report.anomalies[0],
            LoadAnomaly::IncompatiblePayload { .. }
        ));
    }

    #[test]
    fn category_change_becomes_placeholder() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        document.elements.push(stored(1, "Math.Add", ElementCategory::Wire, "{}"));
        let loaded = recompose(&document, &registry());
        let element = loaded.graph.get(Guid::from_u128(1)).unwrap();
        assert!(element.is_placeholder());
        assert_eq!(element.category(), ElementCategory::Wire);
    }

    #[test]
    fn duplicate_guid_is_skipped() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        document.elements.push(stored(1, "Math.Add", ElementCategory::Node, r#"{"node":{}}"#));
        document.elements.push(stored(1, "Gone", ElementCategory::Node, "{}"));
        let loaded = recompose(&document, &registry());
        assert_eq!(loaded.graph.len(), 1);
        assert!(!loaded.graph.get(Guid::from_u128(1)).unwrap().is_placeholder());
        assert_eq!(
            loaded.report.anomalies,
            vec![LoadAnomaly::DuplicateGuid { guid: Guid::from_u128(1) }]
        );
    }

    #[test]
    fn dangling_wire_endpoint_is_reported() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        let payload = format!(
            r#"{{"wire":{{"from":{{"node":"{}","port":"out"}},"to":{{"node":"{}","port":"a"}}}}}}"#,
            Guid::from_u128(7),
            Guid::from_u128(1)
        );
        document.elements.push(stored(1, "Math.Add", ElementCategory::Node, r#"{"node":{}}"#));
        document.elements.push(stored(2, "WireModel", ElementCategory::Wire, &payload));
        let loaded = recompose(&document, &registry());
        assert_eq!(
            loaded.report.anomalies,
            vec![LoadAnomaly::DanglingReference {
                element: Guid::from_u128(2),
                target: Guid::from_u128(7),
                reference: ReferenceKind::WireEndpoint,
            }]
        );
    }

    #[test]
    fn placeholder_payload_is_written_back_verbatim() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        let payload = r#"{"legacy":  true,"n":[1,2]}"#;
        document.elements.push(stored(1, "Gone.Node", ElementCategory::Node, payload));
        let loaded = recompose(&document, &registry());
        let saved = decompose(&loaded.graph).unwrap();
        assert_eq!(saved.elements[0].payload.get(), payload);
        assert_eq!(saved.elements[0].type_name, "Gone.Node");
    }

    /// A context node whose only block has an unknown type, wired from a
    /// resolved source node.
    fn context_with_unknown_block() -> StoredDocument {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        let context = format!(
            r#"{{"node":{{"blocks":[{{"guid":"{}","type_name":"Gone.Block","category":"BlockNode","body":{{"node":{{"ports":[{{"id":"in","direction":"Input"}},{{"id":"spare","direction":"Input"}}]}}}}}}]}}}}"#,
            Guid::from_u128(2)
        );
        let source = r#"{"node":{"ports":[{"id":"out","direction":"Output"}]}}"#;
        let wire = format!(
            r#"{{"wire":{{"from":{{"node":"{}","port":"out"}},"to":{{"node":"{}","port":"in"}}}}}}"#,
            Guid::from_u128(3),
            Guid::from_u128(2)
        );
        let elements = [
            stored(1, "ContextNodeModel", ElementCategory::ContextNode, &context),
            stored(3, "Math.Add", ElementCategory::Node, source),
            stored(4, "WireModel", ElementCategory::Wire, &wire),
        ];
        for (index, mut element) in elements.into_iter().enumerate() {
            element.reference_id = ReferenceId(index as i64);
            document.elements.push(element);
        }
        document
    }

    #[test]
    fn unknown_block_becomes_inert_placeholder() {
        let loaded = recompose(&context_with_unknown_block(), &registry());
        let block_guid = Guid::from_u128(2);
        let block = loaded.graph.get(block_guid).unwrap();
        assert!(block.is_placeholder());
        assert!(!block.has_capability(Capabilities::PRUNE_DISCONNECTED_PORTS));
        assert_eq!(loaded.placeholders.guid_for(ReferenceId(3)), Some(block_guid));
        assert_eq!(
            loaded.report.anomalies,
            vec![LoadAnomaly::UnresolvedType {
                guid: block_guid,
                type_name: "Gone.Block".into(),
                category: ElementCategory::BlockNode,
            }]
        );
        assert!(loaded.graph.dependencies_of(block_guid).is_empty());
        assert!(loaded.graph.dependencies().is_empty());

        let mut graph = loaded.graph.clone();
        assert!(!graph.prune_disconnected_ports(block_guid).unwrap());
        let retained = graph.get(block_guid).unwrap().placeholder().unwrap();
        assert!(retained.payload.as_text().unwrap().contains("spare"));

        let saved = decompose(&graph).unwrap();
        assert!(saved.elements[0].payload.get().contains(r#""type_name":"Gone.Block""#));
        assert!(saved.elements[0].payload.get().contains(r#""id":"spare""#));
    }

    #[test]
    fn unknown_block_resolves_once_registered() {
        let mut loaded = recompose(&context_with_unknown_block(), &registry());
        let mut types = registry();
        types
            .register(TypeDescriptor::new("Gone.Block", ElementCategory::BlockNode))
            .unwrap();

        let reports = loaded.placeholders.resolve_pending(&mut loaded.graph, &types);
        assert_eq!(reports.len(), 1);
        let block_guid = Guid::from_u128(2);
        let block = loaded.graph.get(block_guid).unwrap();
        assert!(!block.is_placeholder());
        assert_eq!(block.as_node().unwrap().ports.len(), 2);
        assert_eq!(loaded.graph.dependencies_of(block_guid).len(), 1);
    }

    #[test]
    fn undecodable_block_keeps_its_body() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        let body = r#"{"node":{"title": 7}}"#;
        let context = format!(
            r#"{{"node":{{"blocks":[{{"guid":"{}","type_name":"BlockNodeModel","category":"BlockNode","body":{}}}]}}}}"#,
            Guid::from_u128(2),
            body
        );
        document
            .elements
            .push(stored(1, "ContextNodeModel", ElementCategory::ContextNode, &context));

        let loaded = recompose(&document, &registry());
        let block = loaded.graph.get(Guid::from_u128(2)).unwrap();
        assert_eq!(block.placeholder().unwrap().payload.as_text(), Some(body));
        assert!(matches!(
            &loaded.report.anomalies[..],
            [LoadAnomaly::IncompatiblePayload { guid, .. }] if *guid == Guid::from_u128(2)
        ));
        let saved = decompose(&loaded.graph).unwrap();
        assert!(saved.elements[0].payload.get().contains(body));
    }

    #[test]
    fn stored_reference_id_is_kept() {
        let mut document = StoredDocument::empty(Guid::from_u128(100), "g");
        let mut element = stored(1, "Gone.Node", ElementCategory::Node, "{}");
        element.reference_id = ReferenceId(41);
        document.elements.push(element);
        let mut clash = stored(2, "Gone.Node", ElementCategory::Node, "{}");
        clash.reference_id = ReferenceId(41);
        document.elements.push(clash);

        let loaded = recompose(&document, &registry());
        assert_eq!(loaded.placeholders.guid_for(ReferenceId(41)), Some(Guid::from_u128(1)));
        assert_eq!(loaded.placeholders.guid_for(ReferenceId(42)), Some(Guid::from_u128(2)));
    }
}
