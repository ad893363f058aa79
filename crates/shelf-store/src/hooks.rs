use async_trait::async_trait;
use tracing::{debug, warn};

/// Result of one queued write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    Failed { reason: String },
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// What the write serializer reports after running an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReport {
    /// Position in enqueue order, starting at 0.
    pub seq: u64,
    /// Operation name, e.g. `persist_node`.
    pub op: &'static str,
    pub outcome: WriteOutcome,
}

/// Receives the outcome of every queued write, in execution order.
#[async_trait]
pub trait WriteObserver: Send + Sync {
    async fn on_write(&self, report: &WriteReport);
}

/// Default observer: failures become warnings, successes debug events.
pub struct TracingObserver;

#[async_trait]
impl WriteObserver for TracingObserver {
    async fn on_write(&self, report: &WriteReport) {
        match &report.outcome {
            WriteOutcome::Applied => debug!(seq = report.seq, op = report.op, "queued write applied"),
            WriteOutcome::Failed { reason } => {
                warn!(seq = report.seq, op = report.op, reason = %reason, "queued write failed")
            }
        }
    }
}
