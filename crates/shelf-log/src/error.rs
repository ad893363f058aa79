use shelf_types::TypeError;

/// Errors from node log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error while reading or rewriting the log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A log line could not be decoded.
    #[error("malformed record at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A node or patch violated the record shape.
    #[error("invalid node: {0}")]
    InvalidNode(#[from] TypeError),

    /// Serialization failure while writing the log.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for node log operations.
pub type LogResult<T> = Result<T, LogError>;
