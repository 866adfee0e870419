use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::error::StorageError;
use super::key::QuotaEstimate;

/// Asynchronous storage for large text payloads (data URIs) under opaque keys.
///
/// Every write is a full overwrite, so repeating one is always safe. There is
/// no transactionality across keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    ///
    /// Fails with [`StorageError::QuotaExceeded`] before writing anything when
    /// the payload would not fit.
    async fn save_asset(&self, key: &str, data: &str) -> Result<(), StorageError>;

    /// Retrieve the payload at `key`, or `None` if there is none.
    async fn get_asset(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Delete the payload at `key`. Deleting a missing key succeeds.
    async fn delete_asset(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every payload in the store.
    async fn clear_assets(&self) -> Result<(), StorageError>;

    /// Current usage estimate, if the backend can provide one.
    async fn estimate(&self) -> Result<Option<QuotaEstimate>, StorageError> {
        Ok(None)
    }
}

/// Synchronous storage for small JSON documents.
pub trait MetadataStore: Send + Sync {
    /// Raw document text at `key`.
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the document at `key`.
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the document at `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently present.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Typed access on top of [`MetadataStore`].
pub trait MetadataStoreExt: MetadataStore {
    /// Load and parse the document at `key`.
    ///
    /// Missing keys, unreadable documents and malformed JSON all yield
    /// `fallback`; the last two are logged.
    fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return fallback,
            Err(e) => {
                warn!(key = %key, error = %e, "Metadata read failed, using fallback");
                return fallback;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Malformed metadata, using fallback");
                fallback
            }
        }
    }

    /// Serialize `value` and overwrite the document at `key`.
    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }
}

impl<S: MetadataStore + ?Sized> MetadataStoreExt for S {}
