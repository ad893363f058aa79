use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use shelf_log::NodeLog;
use shelf_store::{Mutation, ObjectKind, ObjectStore, StoreError};
use shelf_types::{Node, NodeUuid, SyncDirection, SyncNode};

use crate::error::{SyncError, SyncResult};
use crate::payload::NodePayload;
use crate::plan::{classify, SyncPlan};

/// The storage projection held for the duration of one exchange.
#[derive(Debug)]
struct SyncSession {
    log_path: PathBuf,
    storage: Vec<SyncNode>,
    plan: Option<SyncPlan>,
}

/// Reconciles client snapshots with a store.
///
/// Storage is only ever read as [`SyncNode`] projections streamed from the
/// node log; satellite content is touched only when pull payloads are
/// assembled. At most one session is open at a time.
pub struct SyncEngine {
    direction: SyncDirection,
    session: Mutex<Option<SyncSession>>,
}

impl SyncEngine {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            session: Mutex::new(None),
        }
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    /// Load the storage projection and keep it until
    /// [`close_session`](Self::close_session).
    pub fn open_session(&self, store: &ObjectStore) -> SyncResult<()> {
        let mut session = self.session.lock().expect("sync session mutex poisoned");
        if session.is_some() {
            return Err(SyncError::SessionActive);
        }
        let log_path = store.config().log_path();
        let storage = scan_storage(&log_path)?;
        debug!(nodes = storage.len(), "sync session opened");
        *session = Some(SyncSession {
            log_path,
            storage,
            plan: None,
        });
        Ok(())
    }

    /// Release the session. Returns `false` when none was open.
    pub fn close_session(&self) -> bool {
        let closed = self.session.lock().expect("sync session mutex poisoned").take().is_some();
        if closed {
            debug!("sync session closed");
        }
        closed
    }

    pub fn is_session_open(&self) -> bool {
        self.session.lock().expect("sync session mutex poisoned").is_some()
    }

    /// The plan computed most recently within the open session.
    pub fn last_plan(&self) -> Option<SyncPlan> {
        self.session
            .lock()
            .expect("sync session mutex poisoned")
            .as_ref()
            .and_then(|s| s.plan.clone())
    }

    /// Diff `incoming` against storage.
    ///
    /// Uses the open session's projection when there is one for this store,
    /// otherwise streams the node log afresh.
    pub fn compute(&self, store: &ObjectStore, incoming: &[SyncNode], last_sync: i64) -> SyncResult<SyncPlan> {
        let log_path = store.config().log_path();
        let mut session = self.session.lock().expect("sync session mutex poisoned");

        let plan = match session.as_mut() {
            Some(s) if s.log_path == log_path => {
                let plan = classify(self.direction, &s.storage, incoming, last_sync);
                s.plan = Some(plan.clone());
                plan
            }
            _ => classify(self.direction, &scan_storage(&log_path)?, incoming, last_sync),
        };

        info!(
            push = plan.push.len(),
            pull = plan.pull.len(),
            delete = plan.delete.len(),
            delete_in_storage = plan.delete_in_storage.len(),
            "sync plan computed"
        );
        Ok(plan)
    }

    /// Build the reply for one pulled node.
    ///
    /// The item mirror is always included when present; satellite objects
    /// only when `pull_content` is set. Missing or unreadable objects are
    /// left out rather than failing the payload.
    pub fn assemble_node_payload(&self, store: &ObjectStore, node: &SyncNode) -> NodePayload {
        let mut payload = NodePayload {
            item: read_optional(store, &node.uuid, ObjectKind::Item),
            ..NodePayload::default()
        };
        if node.pull_content == Some(true) {
            for kind in NodePayload::CONTENT_OBJECTS {
                if let Some(slot) = payload.slot_mut(kind) {
                    *slot = read_optional(store, &node.uuid, kind);
                }
            }
        }
        payload
    }

    /// Payloads for a batch of pulled nodes, in the given order.
    pub fn pull_objects(&self, store: &ObjectStore, nodes: &[SyncNode]) -> Vec<NodePayload> {
        nodes
            .iter()
            .map(|node| self.assemble_node_payload(store, node))
            .collect()
    }

    /// Store pushed nodes and their satellite objects.
    ///
    /// All nodes land in one node log cycle (or the open batch session).
    /// Payloads without an item are skipped. Returns the number of nodes
    /// stored.
    pub fn apply_push(&self, store: &ObjectStore, payloads: &[NodePayload]) -> SyncResult<usize> {
        if !self.direction.accepts_incoming() {
            return Err(SyncError::IncomingDisabled);
        }

        let mut nodes = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match &payload.item {
                Some(item) => nodes.push((parse_item(item)?, payload)),
                None => warn!("pushed payload has no item; skipping"),
            }
        }

        store
            .with_node_log(|log| {
                for (node, _) in &nodes {
                    log.add_node(node.clone());
                    let mirror = serde_json::to_value(node)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    store.persist_object(&node.uuid, ObjectKind::Item, &mirror)?;
                }
                Ok(())
            })
            .and_then(Mutation::into_result)?;

        for (node, payload) in &nodes {
            for (kind, value) in payload.content_objects() {
                store.persist_object(&node.uuid, kind, value)?;
            }
        }

        info!(nodes = nodes.len(), "pushed nodes applied");
        Ok(nodes.len())
    }

    /// Delete nodes the client no longer has, entries and content both.
    pub fn apply_storage_deletions(&self, store: &ObjectStore, uuids: &[NodeUuid]) -> SyncResult<usize> {
        if !self.direction.accepts_incoming() {
            return Err(SyncError::IncomingDisabled);
        }
        let removed = store.delete_nodes(uuids)?.into_result()?;
        info!(requested = uuids.len(), removed, "storage deletions applied");
        Ok(removed)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncDirection::default())
    }
}

fn scan_storage(log_path: &std::path::Path) -> SyncResult<Vec<SyncNode>> {
    let mut storage = Vec::new();
    NodeLog::iterate(log_path, |node| storage.push(SyncNode::from(&node)))?;
    Ok(storage)
}

fn parse_item(item: &serde_json::Value) -> SyncResult<Node> {
    match item {
        serde_json::Value::Object(object) => Ok(Node::from_object(object.clone())?),
        _ => Err(SyncError::InvalidNode(shelf_types::TypeError::InvalidNode(
            "pushed item is not a JSON object".into(),
        ))),
    }
}

fn read_optional(store: &ObjectStore, uuid: &NodeUuid, kind: ObjectKind) -> Option<serde_json::Value> {
    match store.fetch_object(uuid, kind) {
        Ok(value) => value,
        Err(e) => {
            warn!(uuid = %uuid, object = %kind, error = %e, "omitting unreadable object from payload");
            None
        }
    }
}
