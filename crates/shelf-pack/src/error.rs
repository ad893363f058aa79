use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid zip bundle: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("bundle entry name is not UTF-8: {0}")]
    InvalidName(String),

    #[error("unsafe entry path: {0}")]
    UnsafePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type PackResult<T> = Result<T, PackError>;
