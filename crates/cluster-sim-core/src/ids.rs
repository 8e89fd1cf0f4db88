//! Identifier types for nodes and pods.
//!
//! Node identifiers are opaque strings issued by the container backend at
//! provisioning time. Pod identifiers are random UUIDs rendered with a `pod_`
//! prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const POD_PREFIX: &str = "pod_";

/// Opaque, stable identifier of a node.
///
/// The value is whatever the container backend returned from provisioning;
/// the cluster never interprets it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a backend-issued unit identifier.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the identifier is empty or only whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(value))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a pod, based on UUID v4.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PodId(uuid::Uuid);

impl PodId {
    /// Create a new `PodId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `PodId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl FromStr for PodId {
    type Err = IdError;

    /// Parse a `PodId` from `pod_<uuid>`; the bare UUID form is accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(POD_PREFIX).unwrap_or(s);
        let uuid = uuid::Uuid::parse_str(raw).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PodId({})", self.0)
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{POD_PREFIX}{}", self.0)
    }
}

impl TryFrom<String> for PodId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PodId> for String {
    fn from(id: PodId) -> Self {
        id.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier must not be empty")]
    Empty,

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_rejects_empty() {
        assert!(matches!(NodeId::new(""), Err(IdError::Empty)));
        assert!(matches!(NodeId::new("   "), Err(IdError::Empty)));
        assert!(NodeId::new("node_container_1").is_ok());
    }

    #[test]
    fn node_id_display_is_raw_value() {
        let id = NodeId::new("node_container_abc").unwrap();
        assert_eq!(id.to_string(), "node_container_abc");
        assert_eq!(format!("{id:?}"), "NodeId(node_container_abc)");
    }

    #[test]
    fn pod_id_display_has_prefix() {
        let id = PodId::generate();
        let rendered = id.to_string();
        assert!(rendered.starts_with("pod_"));
        assert_eq!(PodId::from_str(&rendered).unwrap(), id);
    }

    #[test]
    fn pod_id_accepts_bare_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let parsed = PodId::from_str(&uuid.to_string()).unwrap();
        assert_eq!(parsed, PodId::from_uuid(uuid));
    }

    #[test]
    fn pod_id_invalid_uuid() {
        let result = PodId::from_str("pod_not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn ids_serde_json() {
        let node = NodeId::new("node-1").unwrap();
        assert_eq!(serde_json::to_string(&node).unwrap(), "\"node-1\"");
        let parsed: NodeId = serde_json::from_str("\"node-1\"").unwrap();
        assert_eq!(parsed, node);
        assert!(serde_json::from_str::<NodeId>("\"\"").is_err());

        let pod = PodId::generate();
        let json = serde_json::to_string(&pod).unwrap();
        let parsed: PodId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pod);
    }
}
