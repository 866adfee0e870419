mod error;
mod key;
mod traits;

pub mod filesystem;
pub mod memory;

use std::sync::Arc;

pub use error::StorageError;
pub use key::{EncodedKey, QuotaEstimate};
pub use traits::{BlobStore, MetadataStore, MetadataStoreExt};

use crate::config::{StorageBackend, StorageConfig};

/// The pair of stores every project shares.
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Stores {
    /// Fresh in-memory stores with no quota.
    pub fn in_memory() -> Self {
        Self {
            blobs: Arc::new(memory::MemoryBlobStore::new()),
            metadata: Arc::new(memory::MemoryMetadataStore::new()),
        }
    }

    /// Open the stores described by `config`.
    ///
    /// The filesystem backend keeps blobs under `{data_dir}/blobs` and
    /// metadata under `{data_dir}/metadata`.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.backend {
            StorageBackend::Memory => {
                let blobs = match config.blob_quota_bytes {
                    Some(quota) => memory::MemoryBlobStore::with_quota(quota),
                    None => memory::MemoryBlobStore::new(),
                };
                let metadata = match config.metadata_quota_bytes {
                    Some(quota) => memory::MemoryMetadataStore::with_quota(quota),
                    None => memory::MemoryMetadataStore::new(),
                };
                Ok(Self {
                    blobs: Arc::new(blobs),
                    metadata: Arc::new(metadata),
                })
            }
            StorageBackend::Filesystem => {
                let blobs = filesystem::FilesystemBlobStore::new(
                    config.data_dir.join("blobs"),
                    config.blob_quota_bytes,
                )
                .await?;
                let metadata = filesystem::FileMetadataStore::new(
                    config.data_dir.join("metadata"),
                    config.metadata_quota_bytes,
                )?;
                Ok(Self {
                    blobs: Arc::new(blobs),
                    metadata: Arc::new(metadata),
                })
            }
        }
    }
}
