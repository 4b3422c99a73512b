//! Raw diagnostics as delivered by a processing run.

use std::fmt;

use nodegraph_core::id::Guid;
use serde::{Deserialize, Serialize};

/// Closed severity scale. Ordering is total: `Log < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Log,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Log => write!(f, "log"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Identifies the graph a diagnostic was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphReference(pub Guid);

/// A fix offered alongside a diagnostic, applied by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickFix {
    pub description: String,
    /// Opaque action payload understood by whoever applies the fix.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub action: serde_json::Value,
}

impl QuickFix {
    pub fn new(description: impl Into<String>) -> Self {
        QuickFix {
            description: description.into(),
            action: serde_json::Value::Null,
        }
    }
}

/// One diagnostic emitted by the processing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDiagnostic {
    /// Element the diagnostic is about.
    pub source: Guid,
    pub graph: GraphReference,
    pub severity: Severity,
    pub message: String,
    /// Element path from the graph root down to `source`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<QuickFix>,
}

impl RawDiagnostic {
    pub fn new(source: Guid, graph: Guid, severity: Severity, message: impl Into<String>) -> Self {
        RawDiagnostic {
            source,
            graph: GraphReference(graph),
            severity,
            message: message.into(),
            context: Vec::new(),
            fix: None,
        }
    }

    pub fn with_context(mut self, path: impl IntoIterator<Item = Guid>) -> Self {
        self.context = path.into_iter().collect();
        self
    }

    pub fn with_fix(mut self, fix: QuickFix) -> Self {
        self.fix = Some(fix);
        self
    }
}
