use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("node identity must not be empty")]
    EmptyUuid,

    #[error("node identity {0:?} is not a plain path component")]
    InvalidUuid(String),

    #[error("node object is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("invalid node record: {0}")]
    InvalidNode(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
