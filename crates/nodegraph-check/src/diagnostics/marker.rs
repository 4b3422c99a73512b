//! Per-element marker read model.
//!
//! A [`Marker`] is what the presentation layer renders on an element: a
//! single diagnostic verbatim, or a roll-up of several diagnostics whose
//! children stay available for drill-down.

use std::fmt;

use nodegraph_core::id::Guid;
use serde::Serialize;

use super::raw::{QuickFix, RawDiagnostic, Severity};

/// One diagnostic attached to an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMarker {
    pub element: Guid,
    pub severity: Severity,
    pub message: String,
    /// Element path from the graph root down to `element`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<Guid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<QuickFix>,
}

impl From<RawDiagnostic> for ErrorMarker {
    fn from(raw: RawDiagnostic) -> Self {
        ErrorMarker {
            element: raw.source,
            severity: raw.severity,
            message: raw.message,
            context: raw.context,
            fix: raw.fix,
        }
    }
}

/// Several diagnostics on one element, rolled up to the worst severity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultipleErrorsMarker {
    pub element: Guid,
    pub severity: Severity,
    pub message: String,
    /// Diagnostics in delivery order.
    pub children: Vec<ErrorMarker>,
    /// Index of the first child carrying the rolled-up severity.
    primary: usize,
}

impl MultipleErrorsMarker {
    /// Rolls up `children`; there must be at least two.
    pub(crate) fn roll_up(element: Guid, children: Vec<ErrorMarker>) -> Self {
        let mut primary = 0;
        for (index, child) in children.iter().enumerate() {
            // Strictly greater: on ties the first occurrence wins.
            if child.severity > children[primary].severity {
                primary = index;
            }
        }
        let severity = children
            .get(primary)
            .map_or(Severity::Log, |c| c.severity);
        MultipleErrorsMarker {
            element,
            severity,
            message: multiple_issues_message(children.len()),
            children,
            primary,
        }
    }

    /// The child that determined the rolled-up severity.
    pub fn primary(&self) -> Option<&ErrorMarker> {
        self.children.get(self.primary)
    }
}

/// Summary message of a roll-up marker.
pub fn multiple_issues_message(count: usize) -> String {
    format!("There are {count} issues. Click the badge to see more.")
}

/// Marker shown on one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    Single(ErrorMarker),
    Multiple(MultipleErrorsMarker),
}

impl Marker {
    pub fn element(&self) -> Guid {
        match self {
            Marker::Single(m) => m.element,
            Marker::Multiple(m) => m.element,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Marker::Single(m) => m.severity,
            Marker::Multiple(m) => m.severity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Marker::Single(m) => &m.message,
            Marker::Multiple(m) => &m.message,
        }
    }

    /// Underlying diagnostics; a single marker is its own only child.
    pub fn children(&self) -> &[ErrorMarker] {
        match self {
            Marker::Single(m) => std::slice::from_ref(m),
            Marker::Multiple(m) => &m.children,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.element(), self.message())
    }
}
