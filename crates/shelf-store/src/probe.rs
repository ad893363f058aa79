use serde::ser::{Serialize, SerializeMap, Serializer};

use shelf_log::{DanglingParent, LogHeader};
use shelf_types::NodeUuid;

/// Whether a store has been initialized.
///
/// Serializes as `{"status": "populated"}` or `{"error": "empty"}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreStatus {
    Populated,
    Empty,
}

impl Serialize for StoreStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Populated => map.serialize_entry("status", "populated")?,
            Self::Empty => map.serialize_entry("error", "empty")?,
        }
        map.end()
    }
}

/// Outcome of reading the node log header.
///
/// Serializes as the header itself, `{"error": "empty"}`, or
/// `{"error": "error", "message": ...}`.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataProbe {
    Header(LogHeader),
    Empty,
    Error(String),
}

impl Serialize for MetadataProbe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Header(header) => header.serialize(serializer),
            Self::Empty => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", "empty")?;
                map.end()
            }
            Self::Error(message) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", "error")?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

/// Structural problems found by an audit. Nothing is repaired.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConsistencyReport {
    /// Object directories with no node in the log.
    pub orphaned: Vec<NodeUuid>,
    /// Nodes whose parent is not in the log.
    pub dangling_parents: Vec<DanglingParent>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.dangling_parents.is_empty()
    }
}
