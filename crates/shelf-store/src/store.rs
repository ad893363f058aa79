use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, info, warn};

use shelf_log::NodeLog;
use shelf_pack::{BundleReader, BundleWriter};
use shelf_types::{Node, NodePatch, NodeUuid};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::objects::{ArchiveMeta, ObjectKind, ARCHIVE_CONTENT_FILE, ARCHIVE_TREE_DIR};
use crate::probe::{ConsistencyReport, MetadataProbe, StoreStatus};

/// What became of a mutator run through [`ObjectStore::with_node_log`].
///
/// A failed mutator does not abort the cycle: the node log is still written
/// (or kept in the open batch session) with whatever the mutator changed
/// before failing.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation<T> {
    Applied(T),
    Failed(String),
}

impl<T> Mutation<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Turn a failed mutation into [`StoreError::MutationFailed`].
    pub fn into_result(self) -> StoreResult<T> {
        match self {
            Self::Applied(value) => Ok(value),
            Self::Failed(reason) => Err(StoreError::MutationFailed(reason)),
        }
    }
}

/// Archive content as returned to a client: always a single byte stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveContent {
    pub meta: ArchiveMeta,
    pub content: Vec<u8>,
}

/// Per-node satellite content plus the read-modify-write discipline around
/// the node log.
///
/// Every operation that touches the node graph goes through
/// [`with_node_log`](Self::with_node_log). Outside a batch session that is a
/// full read, mutate, rewrite cycle; inside one the mutation lands in the
/// session's snapshot and the log is rewritten once on close.
pub struct ObjectStore {
    config: StoreConfig,
    batch: Mutex<Option<NodeLog>>,
    log_writes: AtomicU64,
}

impl ObjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            batch: Mutex::new(None),
            log_writes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of node log rewrites this instance has performed.
    pub fn log_writes(&self) -> u64 {
        self.log_writes.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Batch sessions
    // -----------------------------------------------------------------------

    /// Load the node log and hold it in memory until
    /// [`close_batch_session`](Self::close_batch_session).
    pub fn open_batch_session(&self) -> StoreResult<()> {
        let mut batch = self.batch.lock().expect("batch session mutex poisoned");
        if batch.is_some() {
            return Err(StoreError::BatchSessionActive);
        }
        *batch = Some(NodeLog::read(&self.config.log_path())?);
        debug!("batch session opened");
        Ok(())
    }

    /// Write the session snapshot and end the session. Returns `false` when
    /// no session was open. If the write fails the session stays open.
    pub fn close_batch_session(&self) -> StoreResult<bool> {
        let mut batch = self.batch.lock().expect("batch session mutex poisoned");
        let Some(mut log) = batch.take() else {
            return Ok(false);
        };
        if let Err(e) = self.write_log(&mut log) {
            *batch = Some(log);
            return Err(e);
        }
        debug!("batch session closed");
        Ok(true)
    }

    pub fn is_batch_open(&self) -> bool {
        self.batch.lock().expect("batch session mutex poisoned").is_some()
    }

    /// Apply `mutator` to the node log.
    ///
    /// With a batch session open the session snapshot is mutated and nothing
    /// is written. Otherwise the log is read, mutated, and rewritten. A
    /// mutator error is logged and reported as [`Mutation::Failed`]; the
    /// rewrite still happens. Errors reading or writing the log itself are
    /// returned.
    pub fn with_node_log<T, F>(&self, mutator: F) -> StoreResult<Mutation<T>>
    where
        F: FnOnce(&mut NodeLog) -> StoreResult<T>,
    {
        let mut batch = self.batch.lock().expect("batch session mutex poisoned");
        if let Some(log) = batch.as_mut() {
            return Ok(run_mutator(log, mutator));
        }

        let mut log = NodeLog::read(&self.config.log_path())?;
        let outcome = run_mutator(&mut log, mutator);
        self.write_log(&mut log)?;
        Ok(outcome)
    }

    /// The current node log: the batch snapshot when a session is open,
    /// otherwise a fresh read from disk.
    pub fn read_node_log(&self) -> StoreResult<NodeLog> {
        let batch = self.batch.lock().expect("batch session mutex poisoned");
        match batch.as_ref() {
            Some(log) => Ok(log.clone()),
            None => Ok(NodeLog::read(&self.config.log_path())?),
        }
    }

    fn write_log(&self, log: &mut NodeLog) -> StoreResult<()> {
        log.write(&self.config.log_path())?;
        self.log_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Add (or replace) a node and mirror it into its `item.json`.
    pub fn persist_node(&self, node: &Node) -> StoreResult<Mutation<()>> {
        self.with_node_log(|log| {
            log.add_node(node.clone());
            self.write_item_mirror(node)
        })
    }

    /// Merge `patch` onto a node, drop `remove_fields`, and mirror the merged
    /// node into its `item.json`. Returns the merged node.
    pub fn update_node(&self, patch: &NodePatch, remove_fields: &[String]) -> StoreResult<Mutation<Node>> {
        self.with_node_log(|log| {
            let merged = log.update_node(patch, remove_fields)?;
            self.write_item_mirror(&merged)?;
            Ok(merged)
        })
    }

    /// Apply several patches in one log cycle. Returns how many were applied.
    pub fn update_nodes(&self, patches: &[NodePatch]) -> StoreResult<Mutation<usize>> {
        self.with_node_log(|log| {
            for patch in patches {
                let merged = log.update_node(patch, &[])?;
                self.write_item_mirror(&merged)?;
            }
            Ok(patches.len())
        })
    }

    /// Remove log entries only. Returns how many were present.
    pub fn delete_nodes_shallow(&self, uuids: &[NodeUuid]) -> StoreResult<Mutation<usize>> {
        self.with_node_log(|log| Ok(uuids.iter().filter(|uuid| log.delete_node(uuid)).count()))
    }

    /// Remove object directories only. Best-effort: missing directories are
    /// skipped and failures are logged. Returns how many were removed.
    pub fn delete_node_content(&self, uuids: &[NodeUuid]) -> usize {
        let mut removed = 0;
        for uuid in uuids {
            let dir = self.config.object_dir(uuid.as_str());
            match fs::remove_dir_all(&dir) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(uuid = %uuid, error = %e, "failed to remove object directory"),
            }
        }
        debug!(requested = uuids.len(), removed, "node content deleted");
        removed
    }

    /// Remove log entries, then object directories.
    pub fn delete_nodes(&self, uuids: &[NodeUuid]) -> StoreResult<Mutation<usize>> {
        let outcome = self.delete_nodes_shallow(uuids)?;
        self.delete_node_content(uuids);
        Ok(outcome)
    }

    fn write_item_mirror(&self, node: &Node) -> StoreResult<()> {
        let value = serde_json::to_value(node).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.persist_object(&node.uuid, ObjectKind::Item, &value)
    }

    // -----------------------------------------------------------------------
    // Probes and lifecycle
    // -----------------------------------------------------------------------

    /// Whether the node log exists.
    pub fn check_directory(&self) -> StoreStatus {
        if self.config.log_path().exists() {
            StoreStatus::Populated
        } else {
            StoreStatus::Empty
        }
    }

    /// Read the node log header without loading nodes. Never fails.
    pub fn get_metadata(&self) -> MetadataProbe {
        match NodeLog::read_header(&self.config.log_path()) {
            Ok(Some(header)) => MetadataProbe::Header(header),
            Ok(None) => MetadataProbe::Empty,
            Err(e) => {
                warn!(error = %e, "failed to read node log header");
                MetadataProbe::Error(e.to_string())
            }
        }
    }

    /// Reset any batch session, then delete the node log and every object
    /// directory. Removal failures are logged, not returned.
    pub fn wipe_storage(&self) {
        if let Some(log) = self.batch.lock().expect("batch session mutex poisoned").as_mut() {
            log.reset();
        }

        let log_path = self.config.log_path();
        match fs::remove_file(&log_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %log_path.display(), error = %e, "failed to remove node log"),
        }

        let objects = self.config.objects_root();
        match fs::remove_dir_all(&objects) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %objects.display(), error = %e, "failed to remove object root"),
        }

        info!(path = %self.config.data_path.display(), "storage wiped");
    }

    // -----------------------------------------------------------------------
    // Satellite objects
    // -----------------------------------------------------------------------

    /// Write a JSON object into the node's object directory, creating the
    /// directory on first use.
    pub fn persist_object(&self, uuid: &NodeUuid, kind: ObjectKind, value: &Value) -> StoreResult<()> {
        let dir = self.config.object_dir(uuid.as_str());
        fs::create_dir_all(&dir)?;
        let text = serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(dir.join(kind.file_name()), text)?;
        debug!(uuid = %uuid, object = %kind, "object persisted");
        Ok(())
    }

    /// Read a JSON object. `Ok(None)` when it was never stored.
    pub fn fetch_object(&self, uuid: &NodeUuid, kind: ObjectKind) -> StoreResult<Option<Value>> {
        let path = self.config.object_dir(uuid.as_str()).join(kind.file_name());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    /// Store archive content and its metadata.
    ///
    /// With `contains = "files"` the content must be a ZIP archive and is
    /// unpacked into the node's `archive/` tree; otherwise it is streamed
    /// into `archive_content.blob`. Whichever representation is written, the
    /// other one is removed.
    pub fn persist_archive_content<R: Read>(
        &self,
        uuid: &NodeUuid,
        meta: &ArchiveMeta,
        mut content: R,
    ) -> StoreResult<()> {
        let dir = self.config.object_dir(uuid.as_str());
        let blob_path = dir.join(ARCHIVE_CONTENT_FILE);
        let tree_path = dir.join(ARCHIVE_TREE_DIR);
        fs::create_dir_all(&dir)?;

        if meta.is_files() {
            let mut bytes = Vec::new();
            content.read_to_end(&mut bytes)?;
            let bundle = BundleReader::from_bytes(&bytes)?;
            remove_if_present(&blob_path)?;
            if tree_path.exists() {
                fs::remove_dir_all(&tree_path)?;
            }
            let files = bundle.unpack_into(&tree_path)?;
            debug!(uuid = %uuid, files, "archive stored as directory tree");
        } else {
            if tree_path.exists() {
                fs::remove_dir_all(&tree_path)?;
            }
            let written = io::copy(&mut content, &mut File::create(&blob_path)?)?;
            debug!(uuid = %uuid, bytes = written, "archive stored as blob");
        }

        let meta = serde_json::to_value(meta).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.persist_object(uuid, ObjectKind::Archive, &meta)
    }

    /// Archive metadata only, without touching the content.
    pub fn fetch_archive_metadata(&self, uuid: &NodeUuid) -> StoreResult<Option<ArchiveMeta>> {
        match self.fetch_object(uuid, ObjectKind::Archive)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Archive content as a single byte stream.
    ///
    /// A directory tree is zipped on the fly; a blob is returned as stored.
    /// `Ok(None)` when there is no metadata or no content.
    pub fn fetch_archive_content(&self, uuid: &NodeUuid) -> StoreResult<Option<ArchiveContent>> {
        let Some(meta) = self.fetch_archive_metadata(uuid)? else {
            return Ok(None);
        };
        let dir = self.config.object_dir(uuid.as_str());

        let content = if meta.is_files() {
            let tree_path = dir.join(ARCHIVE_TREE_DIR);
            if !tree_path.is_dir() {
                return Ok(None);
            }
            BundleWriter::from_directory(&tree_path)?.finish_to_bytes()?
        } else {
            match fs::read(dir.join(ARCHIVE_CONTENT_FILE)) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        };
        Ok(Some(ArchiveContent { meta, content }))
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Object directories whose uuid has no node in the log, sorted.
    pub fn get_orphaned_items(&self) -> StoreResult<Vec<NodeUuid>> {
        let log = self.read_node_log()?;
        self.orphans_against(&log)
    }

    /// Remove the object directories of every orphaned item. Returns the
    /// uuids that were orphaned.
    pub fn delete_orphaned_items(&self) -> StoreResult<Vec<NodeUuid>> {
        let orphans = self.get_orphaned_items()?;
        let removed = self.delete_node_content(&orphans);
        info!(orphans = orphans.len(), removed, "orphaned items deleted");
        Ok(orphans)
    }

    /// Report orphaned object directories and dangling parent references.
    pub fn audit(&self) -> StoreResult<ConsistencyReport> {
        let log = self.read_node_log()?;
        let report = ConsistencyReport {
            orphaned: self.orphans_against(&log)?,
            dangling_parents: log.dangling_parents(),
        };
        if !report.is_consistent() {
            warn!(
                orphaned = report.orphaned.len(),
                dangling = report.dangling_parents.len(),
                "store is inconsistent"
            );
        }
        Ok(report)
    }

    /// Rebuild the node log from the `item.json` mirrors, discarding the
    /// previous log. Directories without a readable mirror are skipped.
    /// Returns the number of nodes in the rebuilt log.
    pub fn rebuild_item_index(&self) -> StoreResult<usize> {
        let mut nodes = Vec::new();
        for uuid in self.object_dir_uuids()? {
            match self.fetch_object(&uuid, ObjectKind::Item) {
                Ok(Some(Value::Object(object))) => match Node::from_object(object) {
                    Ok(node) => nodes.push(node),
                    Err(e) => warn!(uuid = %uuid, error = %e, "skipping unreadable item mirror"),
                },
                Ok(Some(_)) => warn!(uuid = %uuid, "skipping item mirror that is not an object"),
                Ok(None) => debug!(uuid = %uuid, "object directory has no item mirror"),
                Err(e) => warn!(uuid = %uuid, error = %e, "skipping unreadable item mirror"),
            }
        }

        let mut log: NodeLog = nodes.into_iter().collect();
        if !log.contains(&NodeUuid::default_shelf()) {
            log.add_node(Node::default_shelf(shelf_types::now_millis()));
        }

        let mut batch = self.batch.lock().expect("batch session mutex poisoned");
        self.write_log(&mut log)?;
        let count = log.len();
        if batch.is_some() {
            *batch = Some(log);
        }
        info!(nodes = count, "item index rebuilt");
        Ok(count)
    }

    fn orphans_against(&self, log: &NodeLog) -> StoreResult<Vec<NodeUuid>> {
        Ok(self
            .object_dir_uuids()?
            .into_iter()
            .filter(|uuid| !log.contains(uuid))
            .collect())
    }

    /// Uuids of every object directory, sorted.
    fn object_dir_uuids(&self) -> StoreResult<Vec<NodeUuid>> {
        let root = self.config.objects_root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut uuids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(uuid) = NodeUuid::new(name) {
                    uuids.push(uuid);
                }
            }
        }
        uuids.sort();
        Ok(uuids)
    }
}

fn run_mutator<T, F>(log: &mut NodeLog, mutator: F) -> Mutation<T>
where
    F: FnOnce(&mut NodeLog) -> StoreResult<T>,
{
    match mutator(log) {
        Ok(value) => Mutation::Applied(value),
        Err(e) => {
            warn!(error = %e, "node log mutation failed");
            Mutation::Failed(e.to_string())
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
