use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a sync session is already open")]
    SessionActive,

    #[error("storage does not accept incoming changes in pull-only mode")]
    IncomingDisabled,

    #[error("invalid node in payload: {0}")]
    InvalidNode(#[from] shelf_types::TypeError),

    #[error("node log error: {0}")]
    Log(#[from] shelf_log::LogError),

    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
