use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Watch setup error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Analysis budget exceeded")]
    BudgetExceeded,

    #[error("{0}")]
    Other(String),
}
