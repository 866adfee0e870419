use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::StorageError;
use super::key::QuotaEstimate;
use super::traits::{BlobStore, MetadataStore};

/// Byte-counting map shared by both in-memory stores.
#[derive(Default)]
struct QuotaMap {
    entries: DashMap<String, String>,
    usage: AtomicU64,
    quota: Option<u64>,
}

impl QuotaMap {
    fn with_quota(quota: Option<u64>) -> Self {
        Self {
            quota,
            ..Default::default()
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn insert(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let incoming = value.len() as u64;
        // Holding the entry guard serializes writers of the same key.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let replaced = occupied.get().len() as u64;
                self.admit(replaced, incoming)?;
                occupied.insert(value.to_string());
                self.usage.fetch_add(incoming, Ordering::SeqCst);
                self.usage.fetch_sub(replaced, Ordering::SeqCst);
            }
            Entry::Vacant(vacant) => {
                self.admit(0, incoming)?;
                vacant.insert(value.to_string());
                self.usage.fetch_add(incoming, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn admit(&self, replaced: u64, incoming: u64) -> Result<(), StorageError> {
        match self.estimate() {
            Some(estimate) => estimate.admit(replaced, incoming),
            None => Ok(()),
        }
    }

    fn remove(&self, key: &str) {
        if let Some((_, old)) = self.entries.remove(key) {
            self.usage.fetch_sub(old.len() as u64, Ordering::SeqCst);
        }
    }

    fn clear(&self) {
        self.entries.clear();
        self.usage.store(0, Ordering::SeqCst);
    }

    fn estimate(&self) -> Option<QuotaEstimate> {
        self.quota.map(|quota| QuotaEstimate {
            usage: self.usage.load(Ordering::SeqCst),
            quota,
        })
    }
}

/// Blob store held entirely in process memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    map: QuotaMap,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes beyond `quota` bytes in total.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            map: QuotaMap::with_quota(Some(quota)),
        }
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.map.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.entries.is_empty()
    }

    /// Keys of every stored payload, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save_asset(&self, key: &str, data: &str) -> Result<(), StorageError> {
        self.map.insert(key, data)
    }

    async fn get_asset(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key))
    }

    async fn delete_asset(&self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }

    async fn clear_assets(&self) -> Result<(), StorageError> {
        self.map.clear();
        Ok(())
    }

    async fn estimate(&self) -> Result<Option<QuotaEstimate>, StorageError> {
        Ok(self.map.estimate())
    }
}

/// Metadata store held entirely in process memory.
#[derive(Default)]
pub struct MemoryMetadataStore {
    map: QuotaMap,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes beyond `quota` bytes in total.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            map: QuotaMap::with_quota(Some(quota)),
        }
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.insert(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.map.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}
