use std::path::PathBuf;

use serde::Deserialize;

/// Which physical backend holds the two stores.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Memory,
}

/// Storage configuration shared by the server and the CLI.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Backend for both stores. Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend. Default: "./data".
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Total bytes the blob store may hold. Default: unlimited.
    #[serde(default)]
    pub blob_quota_bytes: Option<u64>,
    /// Total bytes the metadata store may hold. Default: 5 MiB.
    #[serde(default = "default_metadata_quota_bytes")]
    pub metadata_quota_bytes: Option<u64>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_metadata_quota_bytes() -> Option<u64> {
    Some(5 * 1024 * 1024)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            blob_quota_bytes: None,
            metadata_quota_bytes: default_metadata_quota_bytes(),
        }
    }
}
