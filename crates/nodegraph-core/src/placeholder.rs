//! Placeholder substitution and rebinding.
//!
//! When a stored element's type identifier does not resolve, the loader asks
//! the [`PlaceholderRegistry`] for a stand-in. Creation never fails: the
//! placeholder keeps the element's GUID, its load-session reference id and the
//! original payload bytes, and carries the reduced placeholder capability set.
//!
//! The registry remembers which GUID stands in for each reference id so that
//! a later resolution can be rebound in place with
//! [`PlaceholderRegistry::rebind`]. It also remembers where rebinding moved
//! each GUID, so placeholders resolved afterwards point at the new elements.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::element::{
    decode_body, encode_body, ElementBody, ElementCategory, GraphElement, NodeData,
    PlaceholderMetadata, SerializedPayload,
};
use crate::error::CoreError;
use crate::graph::GraphModel;
use crate::id::{Guid, ReferenceId};
use crate::type_registry::TypeRegistry;

/// Outcome of rebinding one placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebindReport {
    pub reference_id: ReferenceId,
    pub old_guid: Guid,
    pub new_guid: Guid,
    /// Wires whose endpoints were moved to the new GUID.
    pub rewired_wires: usize,
    /// Variable and portal references moved to the new GUID.
    pub rewired_references: usize,
}

/// Why a block of a resolved node was swapped for a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubstitutionReason {
    UnresolvedType,
    /// The type now resolves to this category.
    CategoryChanged { category: ElementCategory },
    /// The body no longer decodes into the category's shape.
    UndecodableBody,
}

/// A block replaced by [`PlaceholderRegistry::substitute_blocks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutedBlock {
    pub guid: Guid,
    pub type_name: String,
    pub category: ElementCategory,
    pub reference_id: ReferenceId,
    pub reason: SubstitutionReason,
}

/// Tracks unresolved elements by reference id within one document.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRegistry {
    by_reference: IndexMap<ReferenceId, Guid>,
    /// Old GUID -> GUID it was rebound to.
    moved: HashMap<Guid, Guid>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an inert stand-in for an element whose type did not resolve.
    ///
    /// The returned element has the requested category and GUID, a body
    /// defaulted to the category's shape, and `payload` retained verbatim.
    pub fn create_placeholder(
        &mut self,
        category: ElementCategory,
        type_identifier: &str,
        guid: Guid,
        reference_id: ReferenceId,
        payload: SerializedPayload,
    ) -> GraphElement {
        warn!(
            type_name = type_identifier,
            %category,
            %guid,
            reference = %reference_id,
            "unresolved element type, substituting placeholder"
        );
        self.by_reference.insert(reference_id, guid);
        GraphElement::new_placeholder(
            guid,
            type_identifier,
            category,
            PlaceholderMetadata {
                reference_id,
                payload,
            },
        )
    }

    /// Tracks a placeholder that already exists, e.g. one read back from a
    /// document store. Returns `false` for resolved elements.
    pub fn track(&mut self, element: &GraphElement) -> bool {
        match element.placeholder() {
            Some(metadata) => {
                self.by_reference.insert(metadata.reference_id, element.guid());
                true
            }
            None => false,
        }
    }

    /// Replaces every block of `element` that cannot be used as-is with a
    /// placeholder, taking reference ids from `next_reference`.
    ///
    /// A block is replaced when its type does not resolve or resolves to
    /// another category. Blocks whose body was already read back as a
    /// placeholder are registered under a fresh reference id.
    pub fn substitute_blocks(
        &mut self,
        element: &mut GraphElement,
        registry: &TypeRegistry,
        mut next_reference: impl FnMut() -> ReferenceId,
    ) -> Vec<SubstitutedBlock> {
        let Some(data) = element.as_node_mut() else {
            return Vec::new();
        };
        let mut substituted = Vec::new();
        for block in &mut data.blocks {
            let guid = block.guid();
            let reason = if block.is_placeholder() {
                SubstitutionReason::UndecodableBody
            } else {
                match registry.resolve(block.type_name()) {
                    None => SubstitutionReason::UnresolvedType,
                    Some(descriptor) if descriptor.category() != block.category() => {
                        SubstitutionReason::CategoryChanged {
                            category: descriptor.category(),
                        }
                    }
                    Some(_) => continue,
                }
            };

            let reference_id = if let Some(metadata) = block.placeholder_mut() {
                let reference_id = next_reference();
                metadata.reference_id = reference_id;
                self.by_reference.insert(reference_id, guid);
                warn!(
                    type_name = block.type_name(),
                    %guid,
                    reference = %reference_id,
                    "block body does not decode, keeping placeholder"
                );
                reference_id
            } else {
                let payload = match encode_body(block.body()) {
                    Ok(bytes) => SerializedPayload::new(bytes),
                    Err(err) => {
                        warn!(%guid, %err, "cannot encode block, leaving it in place");
                        continue;
                    }
                };
                let reference_id = next_reference();
                let placeholder = self.create_placeholder(
                    block.category(),
                    block.type_name(),
                    guid,
                    reference_id,
                    payload,
                );
                *block = placeholder;
                reference_id
            };
            substituted.push(SubstitutedBlock {
                guid,
                type_name: block.type_name().to_string(),
                category: block.category(),
                reference_id,
                reason,
            });
        }
        substituted
    }

    /// GUID of the placeholder registered under `reference_id`.
    pub fn guid_for(&self, reference_id: ReferenceId) -> Option<Guid> {
        self.by_reference.get(&reference_id).copied()
    }

    /// Pending placeholders in creation order.
    pub fn pending(&self) -> impl Iterator<Item = (ReferenceId, Guid)> + '_ {
        self.by_reference.iter().map(|(r, g)| (*r, *g))
    }

    pub fn len(&self) -> usize {
        self.by_reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reference.is_empty()
    }

    /// Replaces the placeholder registered under `reference_id` with
    /// `resolved`.
    ///
    /// Wires and declaration references pointing at the placeholder's GUID
    /// are moved to the resolved element's GUID, and dependencies are
    /// re-derived for it. On success the reference id is no longer pending.
    pub fn rebind(
        &mut self,
        graph: &mut GraphModel,
        reference_id: ReferenceId,
        resolved: GraphElement,
    ) -> Result<RebindReport, CoreError> {
        let old = self
            .guid_for(reference_id)
            .ok_or(CoreError::UnknownReference { reference_id })?;
        let report = graph.replace_placeholder(reference_id, old, resolved)?;
        self.by_reference.shift_remove(&reference_id);
        self.record_move(report.old_guid, report.new_guid);
        debug!(
            reference = %reference_id,
            old = %report.old_guid,
            new = %report.new_guid,
            wires = report.rewired_wires,
            "placeholder rebound"
        );
        Ok(report)
    }

    /// Retries every pending placeholder against `registry`.
    ///
    /// A placeholder is rebound, keeping its GUID, when its type now resolves
    /// to the same category and its retained payload decodes into that shape.
    /// The rest stay pending. Entries whose element left the graph are
    /// forgotten.
    pub fn resolve_pending(
        &mut self,
        graph: &mut GraphModel,
        registry: &TypeRegistry,
    ) -> Vec<RebindReport> {
        let pending: Vec<(ReferenceId, Guid)> = self.pending().collect();
        let mut reports = Vec::new();
        for (reference_id, guid) in pending {
            let Some(placeholder) = graph.get(guid).filter(|e| e.is_placeholder()) else {
                self.by_reference.shift_remove(&reference_id);
                continue;
            };
            let Some(resolved) = self.resolve_placeholder(placeholder, registry) else {
                continue;
            };
            match self.rebind(graph, reference_id, resolved) {
                Ok(report) => reports.push(report),
                Err(err) => debug!(reference = %reference_id, %err, "placeholder still pending"),
            }
        }
        reports
    }

    /// Where rebinding moved `guid`, or `guid` itself.
    pub fn moved_to(&self, guid: Guid) -> Guid {
        self.moved.get(&guid).copied().unwrap_or(guid)
    }

    fn record_move(&mut self, old: Guid, new: Guid) {
        if old == new {
            return;
        }
        for target in self.moved.values_mut() {
            if *target == old {
                *target = new;
            }
        }
        self.moved.insert(old, new);
    }

    /// Rebuilds the real element for a placeholder if its type is now known.
    ///
    /// References in the decoded body follow earlier rebinds.
    fn resolve_placeholder(
        &self,
        placeholder: &GraphElement,
        registry: &TypeRegistry,
    ) -> Option<GraphElement> {
        let descriptor = registry.resolve(placeholder.type_name())?;
        if descriptor.category() != placeholder.category() {
            return None;
        }
        let metadata = placeholder.placeholder()?;
        let mut body = decode_body(metadata.payload.as_bytes()).ok()?;
        self.follow_moves(&mut body);
        GraphElement::new(
            placeholder.guid(),
            descriptor.name(),
            descriptor.category(),
            body,
        )
        .ok()
    }

    fn follow_moves(&self, body: &mut ElementBody) {
        if self.moved.is_empty() {
            return;
        }
        match body {
            ElementBody::Wire(wire) => {
                for endpoint in [&mut wire.from, &mut wire.to].into_iter().flatten() {
                    endpoint.node = self.moved_to(endpoint.node);
                }
            }
            ElementBody::Node(data) => {
                self.follow_node_moves(data);
                for block in data.blocks.iter_mut().filter_map(GraphElement::as_node_mut) {
                    self.follow_node_moves(block);
                }
            }
            ElementBody::VariableDeclaration(_) | ElementBody::PortalDeclaration(_) => {}
        }
    }

    fn follow_node_moves(&self, data: &mut NodeData) {
        if let Some(variable) = data.variable.as_mut() {
            *variable = self.moved_to(*variable);
        }
        if let Some(portal) = data.portal.as_mut() {
            portal.declaration = self.moved_to(portal.declaration);
        }
    }
}
