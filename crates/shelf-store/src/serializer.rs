//! Single-worker write queue.
//!
//! Request handlers run concurrently, but the node log must see one
//! read-modify-write cycle at a time. Every mutating call is therefore sent
//! as a [`WriteOp`] to one background task that runs them strictly in
//! enqueue order, each on the blocking pool. A failing op is reported to the
//! [`WriteObserver`] and the worker moves on to the next one.
//!
//! Operations invoked directly on the [`ObjectStore`] instead of through the
//! queue are not ordered against queued ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shelf_types::{Node, NodePatch, NodeUuid};

use crate::error::{StoreError, StoreResult};
use crate::hooks::{WriteObserver, WriteOutcome, WriteReport};
use crate::objects::ObjectKind;
use crate::store::{Mutation, ObjectStore};

/// A mutating store call, captured with its arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    OpenBatchSession,
    CloseBatchSession,
    PersistNode(Node),
    UpdateNode {
        patch: NodePatch,
        remove_fields: Vec<String>,
    },
    UpdateNodes(Vec<NodePatch>),
    DeleteNodes(Vec<NodeUuid>),
    DeleteNodesShallow(Vec<NodeUuid>),
    PersistObject {
        uuid: NodeUuid,
        kind: ObjectKind,
        value: Value,
    },
}

impl WriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenBatchSession => "open_batch_session",
            Self::CloseBatchSession => "close_batch_session",
            Self::PersistNode(_) => "persist_node",
            Self::UpdateNode { .. } => "update_node",
            Self::UpdateNodes(_) => "update_nodes",
            Self::DeleteNodes(_) => "delete_nodes",
            Self::DeleteNodesShallow(_) => "delete_nodes_shallow",
            Self::PersistObject { .. } => "persist_object",
        }
    }

    /// Run the op against `store`, folding every failure into the outcome.
    pub fn apply(self, store: &ObjectStore) -> WriteOutcome {
        let result = match self {
            Self::OpenBatchSession => store.open_batch_session(),
            Self::CloseBatchSession => store.close_batch_session().map(|_| ()),
            Self::PersistNode(node) => store.persist_node(&node).and_then(Mutation::into_result),
            Self::UpdateNode {
                patch,
                remove_fields,
            } => store
                .update_node(&patch, &remove_fields)
                .and_then(Mutation::into_result)
                .map(|_| ()),
            Self::UpdateNodes(patches) => store
                .update_nodes(&patches)
                .and_then(Mutation::into_result)
                .map(|_| ()),
            Self::DeleteNodes(uuids) => store
                .delete_nodes(&uuids)
                .and_then(Mutation::into_result)
                .map(|_| ()),
            Self::DeleteNodesShallow(uuids) => store
                .delete_nodes_shallow(&uuids)
                .and_then(Mutation::into_result)
                .map(|_| ()),
            Self::PersistObject { uuid, kind, value } => store.persist_object(&uuid, kind, &value),
        };
        match result {
            Ok(()) => WriteOutcome::Applied,
            Err(e) => WriteOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

enum Command {
    Op { seq: u64, op: WriteOp },
    Barrier(oneshot::Sender<()>),
}

/// Handle to the background write worker.
pub struct WriteSerializer {
    tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_seq: AtomicU64,
}

impl WriteSerializer {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<ObjectStore>, observer: Arc<dyn WriteObserver>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, observer, rx));
        info!("write serializer started");
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Queue an op without waiting for it. Returns its sequence number.
    pub fn enqueue(&self, op: WriteOp) -> StoreResult<u64> {
        let tx = self.tx.lock().expect("serializer sender mutex poisoned");
        let tx = tx.as_ref().ok_or(StoreError::SerializerClosed)?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        debug!(seq, op = op.name(), "write enqueued");
        tx.send(Command::Op { seq, op })
            .map_err(|_| StoreError::SerializerClosed)?;
        Ok(seq)
    }

    /// Resolve once every op enqueued before this call has finished.
    pub async fn flush(&self) -> StoreResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        {
            let tx = self.tx.lock().expect("serializer sender mutex poisoned");
            let tx = tx.as_ref().ok_or(StoreError::SerializerClosed)?;
            tx.send(Command::Barrier(done_tx))
                .map_err(|_| StoreError::SerializerClosed)?;
        }
        done_rx.await.map_err(|_| StoreError::SerializerClosed)
    }

    /// Stop accepting ops, drain what is queued, and wait for the worker.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().expect("serializer sender mutex poisoned").take());
        let worker = self.worker.lock().expect("serializer worker mutex poisoned").take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "write serializer worker ended abnormally");
            }
        }
    }
}

async fn run_worker(
    store: Arc<ObjectStore>,
    observer: Arc<dyn WriteObserver>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Op { seq, op } => {
                let name = op.name();
                let task_store = Arc::clone(&store);
                let outcome = match tokio::task::spawn_blocking(move || op.apply(&task_store)).await {
                    Ok(outcome) => outcome,
                    Err(e) => WriteOutcome::Failed {
                        reason: format!("write task aborted: {e}"),
                    },
                };
                observer
                    .on_write(&WriteReport {
                        seq,
                        op: name,
                        outcome,
                    })
                    .await;
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    info!("write serializer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use shelf_log::NodeLog;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<WriteReport>>,
    }

    #[async_trait]
    impl WriteObserver for Recorder {
        async fn on_write(&self, report: &WriteReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    fn node(id: &str) -> Node {
        serde_json::from_value(json!({"uuid": id, "type": "bookmark", "parent": "default"})).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Arc<ObjectStore>, Arc<Recorder>, WriteSerializer) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStore::new(StoreConfig::new(dir.path())));
        let recorder = Arc::new(Recorder::default());
        let serializer = WriteSerializer::spawn(Arc::clone(&store), recorder.clone());
        (dir, store, recorder, serializer)
    }

    #[tokio::test]
    async fn ops_run_in_enqueue_order() {
        let (_dir, store, recorder, serializer) = setup();
        for i in 0..20 {
            serializer.enqueue(WriteOp::PersistNode(node(&format!("N{i:02}")))).unwrap();
        }
        serializer.flush().await.unwrap();

        let reports = recorder.reports.lock().unwrap().clone();
        let seqs: Vec<u64> = reports.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>());
        assert!(reports.iter().all(|r| r.outcome.is_applied()));
        assert_eq!(store.log_writes(), 20);
        assert_eq!(store.read_node_log().unwrap().len(), 21);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_lose_no_update() {
        let (_dir, store, _recorder, serializer) = setup();
        let serializer = Arc::new(serializer);

        let mut tasks = Vec::new();
        for t in 0..8 {
            let serializer = Arc::clone(&serializer);
            tasks.push(tokio::spawn(async move {
                for i in 0..5 {
                    serializer
                        .enqueue(WriteOp::PersistNode(node(&format!("T{t}-{i}"))))
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        serializer.flush().await.unwrap();

        let log = NodeLog::read(&store.config().log_path()).unwrap();
        assert_eq!(log.len(), 41);
    }

    #[tokio::test]
    async fn failure_is_reported_and_worker_continues() {
        let (_dir, store, recorder, serializer) = setup();
        let bad = NodePatch::from_value(json!({"uuid": "X", "title": "no type"})).unwrap();
        serializer
            .enqueue(WriteOp::UpdateNode {
                patch: bad,
                remove_fields: vec![],
            })
            .unwrap();
        serializer.enqueue(WriteOp::PersistNode(node("A"))).unwrap();
        serializer.flush().await.unwrap();

        let reports = recorder.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].op, "update_node");
        assert!(matches!(reports[0].outcome, WriteOutcome::Failed { .. }));
        assert_eq!(reports[1].outcome, WriteOutcome::Applied);
        assert!(store.read_node_log().unwrap().contains(&NodeUuid::new("A").unwrap()));
    }

    #[tokio::test]
    async fn batch_session_through_queue() {
        let (_dir, store, recorder, serializer) = setup();
        serializer.enqueue(WriteOp::OpenBatchSession).unwrap();
        for id in ["A", "B", "C"] {
            serializer.enqueue(WriteOp::PersistNode(node(id))).unwrap();
        }
        serializer.flush().await.unwrap();
        assert_eq!(store.log_writes(), 0);

        serializer.enqueue(WriteOp::CloseBatchSession).unwrap();
        serializer.flush().await.unwrap();
        assert_eq!(store.log_writes(), 1);
        assert!(recorder.reports.lock().unwrap().iter().all(|r| r.outcome.is_applied()));
    }

    #[tokio::test]
    async fn shutdown_drains_then_rejects() {
        let (_dir, store, recorder, serializer) = setup();
        serializer.enqueue(WriteOp::PersistNode(node("A"))).unwrap();
        serializer
            .enqueue(WriteOp::PersistObject {
                uuid: NodeUuid::new("A").unwrap(),
                kind: ObjectKind::Notes,
                value: json!({"content": "n"}),
            })
            .unwrap();
        serializer.shutdown().await;

        assert_eq!(recorder.reports.lock().unwrap().len(), 2);
        assert!(store
            .fetch_object(&NodeUuid::new("A").unwrap(), ObjectKind::Notes)
            .unwrap()
            .is_some());
        assert!(matches!(
            serializer.enqueue(WriteOp::PersistNode(node("B"))),
            Err(StoreError::SerializerClosed)
        ));
        assert!(matches!(serializer.flush().await, Err(StoreError::SerializerClosed)));
        serializer.shutdown().await;
    }

    #[test]
    fn op_names() {
        assert_eq!(WriteOp::DeleteNodes(vec![]).name(), "delete_nodes");
        assert_eq!(WriteOp::UpdateNodes(vec![]).name(), "update_nodes");
    }
}
