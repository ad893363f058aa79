use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use shelf_types::{now_millis, Node, NodePatch, NodeUuid};

use crate::error::{LogError, LogResult};
use crate::header::LogHeader;
use crate::tree::{dangling_parents, tree_sort, DanglingParent};

/// In-memory snapshot of the node log.
///
/// Holds the header and every node keyed by uuid. The snapshot itself is
/// plain data: [`NodeLog::read`] builds it from disk, the `*_node` methods
/// mutate it, and [`NodeLog::write`] replaces the file with it. Nothing here
/// guards against two snapshots of the same path being written concurrently.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeLog {
    header: LogHeader,
    nodes: BTreeMap<NodeUuid, Node>,
}

impl NodeLog {
    /// A fresh log holding only the default shelf.
    pub fn new() -> Self {
        let mut log = Self {
            header: LogHeader::fresh(),
            nodes: BTreeMap::new(),
        };
        log.insert_default_shelf();
        log
    }

    /// Read the log at `path`.
    ///
    /// A missing or empty file yields a fresh log. Lines that fail to parse
    /// are logged and skipped; an unreadable header is replaced by a fresh one.
    pub fn read(path: &Path) -> LogResult<Self> {
        let mut header = None;
        let mut nodes = BTreeMap::new();

        match File::open(path) {
            Ok(file) => {
                let mut lines = BufReader::new(file).split(b'\n');
                if let Some(first) = lines.next() {
                    header = parse_header(&first?);
                }
                for (i, line) in lines.enumerate() {
                    match parse_node(i + 2, &line?) {
                        Ok(Some(node)) => {
                            nodes.insert(node.uuid.clone(), node);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(path = %path.display(), error = %e, "skipping node record"),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "node log absent; starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        let mut log = Self {
            header: header.unwrap_or_else(LogHeader::fresh),
            nodes,
        };
        if log.nodes.is_empty() {
            log.insert_default_shelf();
        }

        debug!(path = %path.display(), nodes = log.nodes.len(), "node log read");
        Ok(log)
    }

    /// Read only the header line.
    ///
    /// Returns `Ok(None)` when the file is missing, empty, or its first line
    /// is not a header.
    pub fn read_header(path: &Path) -> LogResult<Option<LogHeader>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match BufReader::new(file).split(b'\n').next() {
            Some(line) => Ok(parse_header(&line?)),
            None => Ok(None),
        }
    }

    /// Stream every node record in the file to `visit` without building the
    /// full snapshot. Returns the number of nodes visited.
    ///
    /// The header is skipped; malformed lines are logged and skipped. A
    /// missing file visits nothing.
    pub fn iterate<F>(path: &Path, mut visit: F) -> LogResult<usize>
    where
        F: FnMut(Node),
    {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        for (i, line) in BufReader::new(file).split(b'\n').enumerate().skip(1) {
            match parse_node(i + 1, &line?) {
                Ok(Some(node)) => {
                    visit(node);
                    count += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping node record"),
            }
        }
        Ok(count)
    }

    /// Rewrite the whole file with this snapshot.
    ///
    /// The header's entity count and timestamp are refreshed, nodes are
    /// written parents first, and the content is written to a temporary file
    /// in the same directory which then atomically replaces `path`. The
    /// on-disk log is therefore always either the previous snapshot or this
    /// one.
    pub fn write(&mut self, path: &Path) -> LogResult<()> {
        self.header.stamp(self.nodes.len());

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &self.header)
                .map_err(|e| LogError::Serialization(e.to_string()))?;
            writer.write_all(b"\n")?;
            for node in tree_sort(self.nodes.values()) {
                serde_json::to_writer(&mut writer, node)
                    .map_err(|e| LogError::Serialization(e.to_string()))?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LogError::Io(e.error))?;

        info!(path = %path.display(), entities = self.header.entities, "node log written");
        Ok(())
    }

    /// Drop every node and start over with a fresh header and the default shelf.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.header = LogHeader::fresh();
        self.insert_default_shelf();
    }

    /// Insert or replace a node.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.uuid.clone(), node);
    }

    /// Merge `patch` onto the stored node, remove `remove_fields`, and store
    /// the result, which is also returned.
    ///
    /// An unknown uuid is not an error: the patch is stored as a new node.
    pub fn update_node(&mut self, patch: &NodePatch, remove_fields: &[String]) -> LogResult<Node> {
        let merged = match self.nodes.get(patch.uuid()) {
            Some(existing) => existing.merge(patch, remove_fields)?,
            None => patch.to_node()?,
        };
        self.nodes.insert(merged.uuid.clone(), merged.clone());
        Ok(merged)
    }

    /// Remove a node. Returns `true` if it was present.
    ///
    /// The default shelf is never removed.
    pub fn delete_node(&mut self, uuid: &NodeUuid) -> bool {
        if uuid.is_default_shelf() {
            warn!("refusing to delete the default shelf");
            return false;
        }
        self.nodes.remove(uuid).is_some()
    }

    pub fn get(&self, uuid: &NodeUuid) -> Option<&Node> {
        self.nodes.get(uuid)
    }

    pub fn contains(&self, uuid: &NodeUuid) -> bool {
        self.nodes.contains_key(uuid)
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// All nodes in uuid order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, parents before children.
    pub fn tree_sorted(&self) -> Vec<&Node> {
        tree_sort(self.nodes.values())
    }

    /// Nodes whose parent reference does not resolve.
    pub fn dangling_parents(&self) -> Vec<DanglingParent> {
        dangling_parents(self.nodes.values())
    }

    /// Generate a fresh node identity.
    pub fn generate_uuid() -> NodeUuid {
        NodeUuid::generate()
    }

    fn insert_default_shelf(&mut self) {
        let shelf = Node::default_shelf(now_millis());
        self.nodes.insert(shelf.uuid.clone(), shelf);
    }
}

impl Default for NodeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Node> for NodeLog {
    /// Build a snapshot with a fresh header from the given nodes. The
    /// default shelf is added when the iterator yields nothing.
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut log = Self {
            header: LogHeader::fresh(),
            nodes: iter.into_iter().map(|n| (n.uuid.clone(), n)).collect(),
        };
        if log.nodes.is_empty() {
            log.insert_default_shelf();
        }
        log
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn parse_header(line: &[u8]) -> Option<LogHeader> {
    if is_blank(line) {
        return None;
    }
    match serde_json::from_slice(line) {
        Ok(header) => Some(header),
        Err(e) => {
            warn!(error = %e, "unreadable node log header; using a fresh one");
            None
        }
    }
}

/// Records are decoded from raw bytes so that a line which is not even
/// UTF-8 is just another malformed record.
fn parse_node(line_no: usize, line: &[u8]) -> LogResult<Option<Node>> {
    if is_blank(line) {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_slice(line).map_err(|e| LogError::Parse {
        line: line_no,
        reason: e.to_string(),
    })?;
    let object = match value {
        serde_json::Value::Object(object) => object,
        _ => {
            return Err(LogError::Parse {
                line: line_no,
                reason: "record is not a JSON object".into(),
            })
        }
    };
    Node::from_object(object)
        .map(Some)
        .map_err(|e| LogError::Parse {
            line: line_no,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shelf_types::NodeKind;

    fn node(uuid: &str, parent: Option<&str>, modified: i64) -> Node {
        let mut value = json!({"uuid": uuid, "type": "bookmark", "date_modified": modified});
        if let Some(p) = parent {
            value["parent"] = json!(p);
        }
        serde_json::from_value(value).unwrap()
    }

    fn uuid(s: &str) -> NodeUuid {
        NodeUuid::new(s).unwrap()
    }

    fn patch(value: serde_json::Value) -> NodePatch {
        NodePatch::from_value(value).unwrap()
    }

    #[test]
    fn missing_file_reads_as_default_shelf() {
        let dir = tempfile::tempdir().unwrap();
        let log = NodeLog::read(&dir.path().join("absent.jsonl")).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.contains(&NodeUuid::default_shelf()));
    }

    #[test]
    fn empty_file_reads_as_default_shelf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "").unwrap();
        let log = NodeLog::read(&path).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.get(&NodeUuid::default_shelf()).unwrap().kind == NodeKind::Shelf);
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut log = NodeLog::new();
        log.add_node(node("A", Some("default"), 1));
        log.add_node(node("B", Some("A"), 2));
        log.write(&path).unwrap();

        let read = NodeLog::read(&path).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read.header().entities, 3);
        assert_eq!(read.header().uuid, log.header().uuid);
        for n in log.nodes() {
            assert_eq!(read.get(&n.uuid), Some(n));
        }
    }

    #[test]
    fn rewrite_keeps_entity_count_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut log = NodeLog::new();
        log.add_node(node("A", None, 1));
        log.write(&path).unwrap();

        let mut again = NodeLog::read(&path).unwrap();
        again.write(&path).unwrap();
        let header = NodeLog::read_header(&path).unwrap().unwrap();
        assert_eq!(header.entities, again.len());
    }

    #[test]
    fn children_are_written_after_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut log = NodeLog::new();
        // "0child" sorts before "Zparent" by uuid but must be written after it.
        log.add_node(node("0child", Some("Zparent"), 1));
        log.add_node(node("Zparent", Some("default"), 1));
        log.write(&path).unwrap();

        let mut seen = Vec::new();
        NodeLog::iterate(&path, |n| seen.push(n.uuid.to_string())).unwrap();
        let parent = seen.iter().position(|u| u == "Zparent").unwrap();
        let child = seen.iter().position(|u| u == "0child").unwrap();
        assert!(parent < child);
    }

    #[test]
    fn corrupt_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let header = serde_json::to_string(&LogHeader::fresh()).unwrap();
        let content = format!(
            "{header}\n{}\n{{not json\n{}\n[1,2]\n{}\n",
            json!({"uuid": "A", "type": "shelf"}),
            json!({"uuid": "B", "type": "bookmark", "parent": "A"}),
            json!({"title": "no uuid", "type": "bookmark"}),
        );
        fs::write(&path, content).unwrap();

        let log = NodeLog::read(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains(&uuid("A")));
        assert!(log.contains(&uuid("B")));

        let mut count = 0;
        assert_eq!(NodeLog::iterate(&path, |_| count += 1).unwrap(), 2);
        assert_eq!(count, 2);
    }

    #[test]
    fn non_utf8_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let header = serde_json::to_string(&LogHeader::fresh()).unwrap();
        let mut content = format!("{header}\n{}\n", json!({"uuid": "A", "type": "shelf"})).into_bytes();
        content.extend_from_slice(b"{\"uuid\": \"B\xff\xfe\", \"type\": \"bookmark\"}\n");
        content.extend_from_slice(format!("{}\r\n", json!({"uuid": "C", "type": "bookmark", "parent": "A"})).as_bytes());
        fs::write(&path, content).unwrap();

        let log = NodeLog::read(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains(&uuid("A")));
        assert!(log.contains(&uuid("C")));

        let mut seen = Vec::new();
        assert_eq!(NodeLog::iterate(&path, |n| seen.push(n.uuid)).unwrap(), 2);
        assert_eq!(seen, vec![uuid("A"), uuid("C")]);
    }

    #[test]
    fn non_utf8_header_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut content = b"\xff\xfe not a header\n".to_vec();
        content.extend_from_slice(format!("{}\n", json!({"uuid": "A", "type": "shelf"})).as_bytes());
        fs::write(&path, content).unwrap();

        assert_eq!(NodeLog::read_header(&path).unwrap(), None);
        let log = NodeLog::read(&path).unwrap();
        assert!(log.contains(&uuid("A")));
    }

    #[test]
    fn corrupt_header_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, format!("garbage\n{}\n", json!({"uuid": "A", "type": "shelf"}))).unwrap();

        let log = NodeLog::read(&path).unwrap();
        assert_eq!(log.header().format, crate::header::FORMAT_NAME);
        assert!(log.contains(&uuid("A")));
        assert!(NodeLog::read_header(&path).unwrap().is_none());
    }

    #[test]
    fn iterate_missing_file_visits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let visited = NodeLog::iterate(&dir.path().join("none"), |_| panic!("no nodes")).unwrap();
        assert_eq!(visited, 0);
    }

    #[test]
    fn update_merges_and_removes() {
        let mut log = NodeLog::new();
        let mut stored = node("A", None, 1);
        stored.uri = Some("https://a".into());
        stored.title = Some("old".into());
        log.add_node(stored);

        let merged = log
            .update_node(
                &patch(json!({"uuid": "A", "title": "new", "date_modified": 5})),
                &["uri".to_string()],
            )
            .unwrap();
        assert_eq!(merged.title.as_deref(), Some("new"));
        assert_eq!(merged.date_modified, Some(5));
        assert!(merged.uri.is_none());
        assert_eq!(log.get(&uuid("A")), Some(&merged));
    }

    #[test]
    fn update_of_absent_uuid_inserts_patch() {
        let mut log = NodeLog::new();
        let p = patch(json!({"uuid": "N", "type": "group", "title": "fresh"}));
        let result = log.update_node(&p, &["title".to_string()]).unwrap();
        assert_eq!(result, p.to_node().unwrap());
        assert_eq!(result.title.as_deref(), Some("fresh"));
        assert!(log.contains(&uuid("N")));
    }

    #[test]
    fn delete_node_spares_default_shelf() {
        let mut log = NodeLog::new();
        log.add_node(node("A", None, 1));
        assert!(log.delete_node(&uuid("A")));
        assert!(!log.delete_node(&uuid("A")));
        assert!(!log.delete_node(&NodeUuid::default_shelf()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn reset_restores_default_shelf_and_new_identity() {
        let mut log = NodeLog::new();
        let before = log.header().uuid.clone();
        log.add_node(node("A", None, 1));
        log.reset();
        assert_eq!(log.len(), 1);
        assert!(log.contains(&NodeUuid::default_shelf()));
        assert_ne!(log.header().uuid, before);
    }

    #[test]
    fn write_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("log.jsonl");
        NodeLog::new().write(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn dangling_parent_audit() {
        let mut log = NodeLog::new();
        log.add_node(node("A", Some("ghost"), 1));
        let report = log.dangling_parents();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].node, uuid("A"));
    }

    #[test]
    fn from_iter_of_nothing_has_default_shelf() {
        let log: NodeLog = std::iter::empty().collect();
        assert_eq!(log.len(), 1);
    }
}
