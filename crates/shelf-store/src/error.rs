use shelf_log::LogError;
use shelf_pack::PackError;
use shelf_types::TypeError;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or rewriting the node log failed.
    #[error("node log error: {0}")]
    Log(#[from] LogError),

    /// Archive content could not be packed or unpacked.
    #[error("archive zip error: {0}")]
    Pack(#[from] PackError),

    /// A node or patch was malformed.
    #[error("invalid node: {0}")]
    InvalidNode(#[from] TypeError),

    /// A stored object could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A batch session is already open on this store.
    #[error("a batch session is already open")]
    BatchSessionActive,

    /// A mutation applied through the node log reported failure.
    #[error("mutation failed: {0}")]
    MutationFailed(String),

    /// The write serializer is no longer accepting operations.
    #[error("write serializer has shut down")]
    SerializerClosed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
