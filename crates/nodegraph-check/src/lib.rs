//! Consumers of processing output for node graphs.
//!
//! The processing pass itself runs elsewhere and delivers complete
//! diagnostic batches; this crate turns each batch into the marker read
//! model exposed to the presentation layer.

pub mod diagnostics;

pub use diagnostics::{
    aggregate, DropReason, DroppedDiagnostic, ErrorMarker, Marker, MarkerSet, MarkerStore,
    MultipleErrorsMarker, QuickFix, RawDiagnostic, Severity,
};
