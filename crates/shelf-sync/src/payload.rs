use serde::{Deserialize, Serialize};
use serde_json::Value;

use shelf_store::ObjectKind;

/// One pulled node as sent to the client: its `item.json` mirror plus,
/// when content travels, whichever satellite objects exist.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_index: Option<Value>,
}

impl NodePayload {
    /// Satellite objects that travel with a node when its content is pulled.
    pub const CONTENT_OBJECTS: [ObjectKind; 5] = [
        ObjectKind::Icon,
        ObjectKind::Comments,
        ObjectKind::ArchiveIndex,
        ObjectKind::NotesIndex,
        ObjectKind::CommentsIndex,
    ];

    pub fn slot_mut(&mut self, kind: ObjectKind) -> Option<&mut Option<Value>> {
        match kind {
            ObjectKind::Item => Some(&mut self.item),
            ObjectKind::Icon => Some(&mut self.icon),
            ObjectKind::Comments => Some(&mut self.comments),
            ObjectKind::ArchiveIndex => Some(&mut self.archive_index),
            ObjectKind::NotesIndex => Some(&mut self.notes_index),
            ObjectKind::CommentsIndex => Some(&mut self.comments_index),
            ObjectKind::Archive | ObjectKind::Notes => None,
        }
    }

    /// The satellite objects present in this payload, item excluded.
    pub fn content_objects(&self) -> impl Iterator<Item = (ObjectKind, &Value)> {
        [
            (ObjectKind::Icon, &self.icon),
            (ObjectKind::Comments, &self.comments),
            (ObjectKind::ArchiveIndex, &self.archive_index),
            (ObjectKind::NotesIndex, &self.notes_index),
            (ObjectKind::CommentsIndex, &self.comments_index),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_ref().map(|v| (kind, v)))
    }
}
