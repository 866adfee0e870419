use std::fmt;

/// Errors that can occur during blob or metadata storage operations.
///
/// Absence is not an error: reads of missing keys return `None`.
#[derive(Debug)]
pub enum StorageError {
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The write would not fit in the remaining quota.
    QuotaExceeded { requested: u64, available: u64 },
    /// A value could not be serialized for storage.
    Serialization(serde_json::Error),
    /// The backing store cannot be reached or is in an unusable state.
    Unavailable(String),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::QuotaExceeded {
                requested,
                available,
            } => write!(
                f,
                "storage quota exceeded ({requested} bytes requested, {available} available)"
            ),
            Self::Serialization(err) => write!(f, "storage serialization error: {err}"),
            Self::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}
