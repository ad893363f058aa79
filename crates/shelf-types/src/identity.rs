use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, globally unique identity of a node.
///
/// Identities generated locally are 32 uppercase hex characters with no
/// separators (a random v4 UUID in simple form). Identities received from a
/// client are kept verbatim, but since an identity also names the node's
/// object directory it must be a single plain path component: non-empty,
/// not `.` or `..`, and free of `/`, `\` and NUL.
/// The reserved value [`NodeUuid::DEFAULT_SHELF`] names the always-present
/// default root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeUuid(String);

impl NodeUuid {
    /// Identity of the default shelf, the root every store starts with.
    pub const DEFAULT_SHELF: &'static str = "default";

    /// Wrap an existing identity, rejecting empty strings and anything that
    /// is not usable as a single directory name.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::EmptyUuid);
        }
        if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
            return Err(TypeError::InvalidUuid(value));
        }
        Ok(Self(value))
    }

    /// Generate a fresh, collision-resistant identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// The default shelf identity.
    pub fn default_shelf() -> Self {
        Self(Self::DEFAULT_SHELF.to_string())
    }

    /// Returns `true` for the reserved default shelf identity.
    pub fn is_default_shelf(&self) -> bool {
        self.0 == Self::DEFAULT_SHELF
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeUuid({})", self.0)
    }
}

impl fmt::Display for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeUuid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeUuid> for String {
    fn from(uuid: NodeUuid) -> Self {
        uuid.0
    }
}

impl TryFrom<&str> for NodeUuid {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = NodeUuid::generate();
        let b = NodeUuid::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_id_format() {
        let id = NodeUuid::generate();
        let s = id.as_str();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn empty_id_is_rejected() {
        assert_eq!(NodeUuid::new(""), Err(TypeError::EmptyUuid));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        for bad in [".", "..", "a/b", "a/../../x", "..\\up", "nul\0byte", "/abs"] {
            assert_eq!(
                NodeUuid::new(bad),
                Err(TypeError::InvalidUuid(bad.to_string())),
                "{bad:?} accepted"
            );
        }
        assert!(NodeUuid::new("a.b..c").is_ok());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<NodeUuid>("\"..\"").is_err());
        assert!(serde_json::from_str::<NodeUuid>("\"\"").is_err());
    }

    #[test]
    fn default_shelf_is_recognised() {
        assert!(NodeUuid::default_shelf().is_default_shelf());
        assert!(!NodeUuid::generate().is_default_shelf());
        assert_eq!(NodeUuid::default_shelf().as_str(), "default");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = NodeUuid::new("ABC").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ABC\"");
        let parsed: NodeUuid = serde_json::from_str("\"ABC\"").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn display_is_verbatim() {
        let id = NodeUuid::new("a1b2").unwrap();
        assert_eq!(format!("{id}"), "a1b2");
    }
}
