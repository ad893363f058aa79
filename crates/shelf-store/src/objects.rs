use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File holding packed (blob-mode) archive content.
pub const ARCHIVE_CONTENT_FILE: &str = "archive_content.blob";
/// Directory holding unpacked (`files`-mode) archive content.
pub const ARCHIVE_TREE_DIR: &str = "archive";
/// `contains` tag marking archive content stored as a directory tree.
pub const CONTAINS_FILES: &str = "files";

/// A JSON satellite object kept in a node's object directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Mirror of the node's log entry.
    Item,
    Icon,
    /// Archive metadata; the content itself lives beside it.
    Archive,
    ArchiveIndex,
    Notes,
    NotesIndex,
    Comments,
    CommentsIndex,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 8] = [
        Self::Item,
        Self::Icon,
        Self::Archive,
        Self::ArchiveIndex,
        Self::Notes,
        Self::NotesIndex,
        Self::Comments,
        Self::CommentsIndex,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Item => "item.json",
            Self::Icon => "icon.json",
            Self::Archive => "archive.json",
            Self::ArchiveIndex => "archive_index.json",
            Self::Notes => "notes.json",
            Self::NotesIndex => "notes_index.json",
            Self::Comments => "comments.json",
            Self::CommentsIndex => "comments_index.json",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Metadata stored as `archive.json` next to a node's archive content.
///
/// `contains = "files"` means the content is a zipped directory tree that
/// is kept unpacked on disk; anything else is kept as a single blob. The
/// `type` tag (`bytes` or `text`) is recorded for the client and does not
/// change how the content is stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMeta {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArchiveMeta {
    /// Metadata for blob-mode content of the given type.
    pub fn blob(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// Metadata for a zipped directory tree.
    pub fn files() -> Self {
        Self {
            contains: Some(CONTAINS_FILES.to_string()),
            ..Self::default()
        }
    }

    pub fn is_files(&self) -> bool {
        self.contains.as_deref() == Some(CONTAINS_FILES)
    }
}
