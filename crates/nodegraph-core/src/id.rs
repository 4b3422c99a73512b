//! Identity newtypes for graph elements.
//!
//! A [`Guid`] names an element slot in the document and never changes for the
//! element's lifetime. A [`ReferenceId`] is a load-session correlation key used
//! to rebind placeholders once their real type becomes available. Ports are
//! addressed by [`PortRef`] (owning node GUID plus port id).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable element identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Generates a fresh random GUID.
    pub fn generate() -> Self {
        Guid(Uuid::new_v4())
    }

    /// Builds a GUID from a fixed 128-bit value (useful for fixtures).
    pub const fn from_u128(value: u128) -> Self {
        Guid(Uuid::from_u128(value))
    }

    /// Parses the hyphenated textual form.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Guid)
    }
}

/// Load-session-scoped correlation key for placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub i64);

impl ReferenceId {
    /// Carried by placeholders read from a nested block until a loader
    /// registers them.
    pub const UNASSIGNED: ReferenceId = ReferenceId(-1);
}

/// Identifier of a port, unique within its node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub String);

impl From<&str> for PortId {
    fn from(value: &str) -> Self {
        PortId(value.to_string())
    }
}

/// A port addressed through its owning node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub node: Guid,
    pub port: PortId,
}

impl PortRef {
    pub fn new(node: Guid, port: impl Into<PortId>) -> Self {
        PortRef {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_guids_are_distinct() {
        assert_ne!(Guid::generate(), Guid::generate());
    }

    #[test]
    fn guid_parse_display_roundtrip() {
        let guid = Guid::from_u128(0x1234);
        let text = guid.to_string();
        assert_eq!(text, "00000000-0000-0000-0000-000000001234");
        assert_eq!(Guid::parse(&text), Some(guid));
        assert_eq!(Guid::parse("not-a-guid"), None);
    }

    #[test]
    fn port_ref_display() {
        let port = PortRef::new(Guid::from_u128(1), "out");
        assert_eq!(
            port.to_string(),
            "00000000-0000-0000-0000-000000000001.out"
        );
    }

    #[test]
    fn reference_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&ReferenceId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
