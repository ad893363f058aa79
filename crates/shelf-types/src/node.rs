use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::identity::NodeUuid;

/// Variant tag of a node.
///
/// Serialized as the lowercase tag name under the `type` key. Tags this
/// version does not know are kept verbatim in [`NodeKind::Other`] so that a
/// log written by a newer client survives a rewrite unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Shelf,
    Group,
    Bookmark,
    Archive,
    Separator,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shelf => "shelf",
            Self::Group => "group",
            Self::Bookmark => "bookmark",
            Self::Archive => "archive",
            Self::Separator => "separator",
            Self::Other(tag) => tag,
        }
    }

    /// Shelves and groups may hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Shelf | Self::Group)
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "shelf" => Self::Shelf,
            "group" => Self::Group,
            "bookmark" => Self::Bookmark,
            "archive" => Self::Archive,
            "separator" => Self::Separator,
            _ => Self::Other(tag),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item of the hierarchy: a shelf, group, bookmark, archive or separator.
///
/// Only `uuid` and `type` are required. Every other attribute is optional so
/// that a field named in an update's removal list is truly absent afterwards,
/// and attributes the store does not interpret (`todo_state`, client-specific
/// keys) ride along in [`Node::extra`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: NodeUuid,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<i64>,
    /// Present only when the node has attached satellite content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_modified: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Keys an update may never remove.
    pub const PROTECTED_FIELDS: [&'static str; 2] = ["uuid", "type"];

    /// A bare node of the given kind with no optional attributes.
    pub fn new(uuid: NodeUuid, kind: NodeKind) -> Self {
        Self {
            uuid,
            kind,
            parent: None,
            title: None,
            uri: None,
            pos: None,
            date_added: None,
            date_modified: None,
            content_modified: None,
            extra: Map::new(),
        }
    }

    /// The default shelf, created whenever a store has no nodes at all.
    pub fn default_shelf(now_ms: i64) -> Self {
        Self {
            title: Some(NodeUuid::DEFAULT_SHELF.to_string()),
            date_added: Some(now_ms),
            date_modified: Some(0),
            pos: Some(1),
            ..Self::new(NodeUuid::default_shelf(), NodeKind::Shelf)
        }
    }

    /// Modification time, treating an absent value as the epoch.
    pub fn modified(&self) -> i64 {
        self.date_modified.unwrap_or(0)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Convert to a JSON object.
    pub fn to_object(&self) -> Result<Map<String, Value>, TypeError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TypeError::Serialization("node did not serialize to an object".into())),
            Err(e) => Err(TypeError::Serialization(e.to_string())),
        }
    }

    /// Build a node from a JSON object.
    pub fn from_object(object: Map<String, Value>) -> Result<Self, TypeError> {
        if !object.contains_key("uuid") {
            return Err(TypeError::MissingField("uuid"));
        }
        if !object.contains_key("type") {
            return Err(TypeError::MissingField("type"));
        }
        serde_json::from_value(Value::Object(object))
            .map_err(|e| TypeError::InvalidNode(e.to_string()))
    }

    /// Merge `patch` onto this node, then drop every field named in
    /// `remove_fields`.
    ///
    /// Patch fields win over stored ones. `uuid` and `type` are never
    /// removed.
    pub fn merge(&self, patch: &NodePatch, remove_fields: &[String]) -> Result<Self, TypeError> {
        let mut merged = self.to_object()?;
        for (key, value) in patch.fields() {
            merged.insert(key.clone(), value.clone());
        }
        for field in remove_fields {
            if Self::PROTECTED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            merged.remove(field);
        }
        Self::from_object(merged)
    }
}

/// A merge-patch for a single node.
///
/// A JSON object that always carries the target `uuid`; every other key
/// replaces the stored value of the same name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct NodePatch {
    uuid: NodeUuid,
    fields: Map<String, Value>,
}

impl NodePatch {
    pub fn new(fields: Map<String, Value>) -> Result<Self, TypeError> {
        let uuid = match fields.get("uuid") {
            Some(Value::String(s)) => NodeUuid::new(s.clone())?,
            Some(_) => return Err(TypeError::InvalidNode("`uuid` must be a string".into())),
            None => return Err(TypeError::MissingField("uuid")),
        };
        Ok(Self { uuid, fields })
    }

    /// Build a patch from any JSON value; it must be an object.
    pub fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Err(TypeError::InvalidNode("patch must be a JSON object".into())),
        }
    }

    pub fn uuid(&self) -> &NodeUuid {
        &self.uuid
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Interpret the patch on its own as a complete node.
    pub fn to_node(&self) -> Result<Node, TypeError> {
        Node::from_object(self.fields.clone())
    }
}

impl TryFrom<Map<String, Value>> for NodePatch {
    type Error = TypeError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<NodePatch> for Map<String, Value> {
    fn from(patch: NodePatch) -> Self {
        patch.fields
    }
}

/// A patch that rewrites every field of `node`.
impl TryFrom<&Node> for NodePatch {
    type Error = TypeError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: node.uuid.clone(),
            fields: node.to_object()?,
        })
    }
}
