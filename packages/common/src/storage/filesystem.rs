use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::error::StorageError;
use super::key::{EncodedKey, QuotaEstimate};
use super::traits::{BlobStore, MetadataStore};

const TEMP_DIR: &str = ".tmp";
const METADATA_EXT: &str = ".json";

/// Filesystem-backed blob store.
///
/// Each key is one file, `{base_path}/{hex(key)}`. Writes land in
/// `{base_path}/.tmp` first and are renamed into place, so a failed write
/// never leaves a truncated payload behind.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    quota: Option<u64>,
    usage: Mutex<u64>,
}

impl FilesystemBlobStore {
    /// Open (creating if needed) a blob store rooted at `base_path`.
    ///
    /// Existing payloads are counted towards `quota`.
    pub async fn new(base_path: PathBuf, quota: Option<u64>) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(TEMP_DIR)).await?;

        let mut usage = 0;
        let mut entries = fs::read_dir(&base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                usage += meta.len();
            }
        }

        Ok(Self {
            base_path,
            quota,
            usage: Mutex::new(usage),
        })
    }

    /// Compute the filesystem path for a key.
    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join(EncodedKey::encode(key).as_file_name())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Swap `replaced` bytes for `incoming` bytes in the usage counter,
    /// refusing when the quota would be exceeded.
    fn reserve(&self, replaced: u64, incoming: u64) -> Result<(), StorageError> {
        let mut usage = self.lock_usage()?;
        if let Some(quota) = self.quota {
            QuotaEstimate {
                usage: *usage,
                quota,
            }
            .admit(replaced, incoming)?;
        }
        *usage = usage.saturating_sub(replaced).saturating_add(incoming);
        Ok(())
    }

    fn release(&self, freed: u64, restored: u64) {
        if let Ok(mut usage) = self.usage.lock() {
            *usage = usage.saturating_sub(freed).saturating_add(restored);
        }
    }

    fn lock_usage(&self) -> Result<std::sync::MutexGuard<'_, u64>, StorageError> {
        self.usage
            .lock()
            .map_err(|_| StorageError::Unavailable("usage counter lock poisoned".into()))
    }
}

async fn file_len(path: &Path) -> Result<u64, StorageError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn save_asset(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key);
        let incoming = data.len() as u64;
        let replaced = file_len(&blob_path).await?;
        self.reserve(replaced, incoming)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            self.release(incoming, replaced);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            self.release(incoming, replaced);
            return Err(e.into());
        }

        debug!(key = %key, bytes = incoming, "Blob written");
        Ok(())
    }

    async fn get_asset(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.blob_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_asset(&self, key: &str) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key);
        let len = file_len(&blob_path).await?;
        match fs::remove_file(&blob_path).await {
            Ok(()) => {
                self.release(len, 0);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_assets(&self) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        *self.lock_usage()? = 0;
        Ok(())
    }

    async fn estimate(&self) -> Result<Option<QuotaEstimate>, StorageError> {
        let usage = *self.lock_usage()?;
        Ok(self.quota.map(|quota| QuotaEstimate { usage, quota }))
    }
}

/// Filesystem-backed metadata store: one JSON document per key.
pub struct FileMetadataStore {
    base_path: PathBuf,
    quota: Option<u64>,
}

impl FileMetadataStore {
    /// Open (creating if needed) a metadata store rooted at `base_path`.
    pub fn new(base_path: PathBuf, quota: Option<u64>) -> Result<Self, StorageError> {
        std::fs::create_dir_all(base_path.join(TEMP_DIR))?;
        Ok(Self { base_path, quota })
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!(
            "{}{METADATA_EXT}",
            EncodedKey::encode(key).as_file_name()
        ))
    }

    fn usage(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        for entry in std::fs::read_dir(&self.base_path)? {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

fn std_file_len(path: &Path) -> Result<u64, StorageError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

impl MetadataStore for FileMetadataStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.doc_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let doc_path = self.doc_path(key);
        if let Some(quota) = self.quota {
            QuotaEstimate {
                usage: self.usage()?,
                quota,
            }
            .admit(std_file_len(&doc_path)?, value.len() as u64)?;
        }

        let temp_path = self
            .base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string());
        if let Err(e) = std::fs::write(&temp_path, value) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&temp_path, &doc_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.doc_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(METADATA_EXT)) else {
                continue;
            };
            if let Some(key) = EncodedKey::decode_file_name(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
