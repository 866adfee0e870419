use common::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid project document: {0}")]
    InvalidFormat(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Whether freeing space and retrying could make the operation succeed.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_quota_exceeded())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
