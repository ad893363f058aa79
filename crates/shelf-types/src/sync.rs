use serde::{Deserialize, Serialize};

use crate::identity::NodeUuid;
use crate::node::Node;

/// Minimal projection of a [`Node`] used for diffing.
///
/// Carries no display fields. The `push_content` / `pull_content` flags are
/// only set on nodes returned in a sync plan and tell the client whether the
/// node's satellite content must travel along with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncNode {
    pub uuid: NodeUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeUuid>,
    #[serde(default)]
    pub date_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_modified: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_content: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_content: Option<bool>,
}

impl SyncNode {
    pub fn new(uuid: NodeUuid, date_modified: i64) -> Self {
        Self {
            uuid,
            parent: None,
            date_modified,
            content_modified: None,
            push_content: None,
            pull_content: None,
        }
    }

    /// Returns `true` if the node carries attached satellite content.
    pub fn has_content(&self) -> bool {
        self.content_modified.is_some()
    }

    /// Whether the content must be transferred: the node has content and
    /// either is new on its side or its content changed after `since`.
    pub fn content_changed(&self, is_new: bool, since: i64) -> bool {
        match self.content_modified {
            Some(modified) => is_new || modified > since,
            None => false,
        }
    }

    /// Drop the transfer flags, keeping only the identity projection.
    pub fn without_flags(mut self) -> Self {
        self.push_content = None;
        self.pull_content = None;
        self
    }
}

/// Which arms of a sync exchange are active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Changes flow both ways; storage may receive pushes and deletions.
    #[default]
    Bidirectional,
    /// Storage is canonical: nothing is pushed into it and nothing is
    /// deleted from it; whatever the client holds beyond storage is deleted
    /// on the client.
    PullOnly,
}

impl SyncDirection {
    pub fn accepts_incoming(self) -> bool {
        matches!(self, Self::Bidirectional)
    }
}

impl From<&Node> for SyncNode {
    fn from(node: &Node) -> Self {
        Self {
            uuid: node.uuid.clone(),
            parent: node.parent.clone(),
            date_modified: node.modified(),
            content_modified: node.content_modified,
            push_content: None,
            pull_content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;

    #[test]
    fn projection_keeps_only_sync_fields() {
        let mut node = Node::new(NodeUuid::new("A").unwrap(), NodeKind::Archive);
        node.parent = Some(NodeUuid::default_shelf());
        node.title = Some("secret title".into());
        node.date_modified = Some(42);
        node.content_modified = Some(40);

        let sync = SyncNode::from(&node);
        let out = serde_json::to_value(&sync).unwrap();
        assert_eq!(
            out,
            json!({"uuid": "A", "parent": "default", "date_modified": 42, "content_modified": 40})
        );
    }

    #[test]
    fn missing_date_modified_defaults_to_zero() {
        let sync: SyncNode = serde_json::from_value(json!({"uuid": "A"})).unwrap();
        assert_eq!(sync.date_modified, 0);
        assert!(!sync.has_content());
    }

    #[test]
    fn direction_serializes_snake_case() {
        assert_eq!(serde_json::to_value(SyncDirection::PullOnly).unwrap(), json!("pull_only"));
        assert_eq!(SyncDirection::default(), SyncDirection::Bidirectional);
        assert!(!SyncDirection::PullOnly.accepts_incoming());
    }

    #[test]
    fn content_changed_rules() {
        let mut sync = SyncNode::new(NodeUuid::new("A").unwrap(), 10);
        assert!(!sync.content_changed(true, 0));

        sync.content_modified = Some(50);
        assert!(sync.content_changed(true, 100));
        assert!(sync.content_changed(false, 40));
        assert!(!sync.content_changed(false, 50));
    }
}
