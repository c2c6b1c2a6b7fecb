use thiserror::Error;

#[derive(Debug, Error)]
pub enum SledStoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("index {0} is closed")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, SledStoreError>;
