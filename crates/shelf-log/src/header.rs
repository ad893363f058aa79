use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shelf_types::{now_millis, NodeUuid};

/// Name of the on-disk format, shared with the browser client.
pub const FORMAT_NAME: &str = "JSON Scrapbook";
/// Current format version.
pub const FORMAT_VERSION: u32 = 1;
/// Value of the header's `type` key for a node index.
pub const INDEX_TYPE: &str = "index";
/// What a node index holds.
pub const CONTAINS_SHELVES: &str = "shelves";
/// Generator recorded in freshly created headers.
pub const GENERATOR: &str = "Shelf";

/// First line of the node log.
///
/// `entities`, `timestamp` and `date` are recomputed on every write. Keys
/// written by other generators are preserved in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogHeader {
    pub format: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub contains: String,
    pub generator: String,
    /// Identity of this log instance.
    pub uuid: String,
    #[serde(default)]
    pub entities: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogHeader {
    /// A header for a brand new log, with a fresh instance uuid.
    pub fn fresh() -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            kind: INDEX_TYPE.to_string(),
            contains: CONTAINS_SHELVES.to_string(),
            generator: GENERATOR.to_string(),
            uuid: NodeUuid::generate().to_string(),
            entities: 0,
            timestamp: None,
            date: None,
            extra: Map::new(),
        }
    }

    /// Refresh the entity count and generation time before a write.
    pub fn stamp(&mut self, entities: usize) {
        let now = now_millis();
        self.entities = entities;
        self.timestamp = Some(now);
        self.date = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now).map(|d| d.to_rfc3339());
    }
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::fresh()
    }
}
