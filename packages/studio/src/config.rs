use std::time::Duration;

use serde::Deserialize;

use crate::project::DEFAULT_PREVIEW_MAX_BYTES;

/// Auto-save behaviour of an open project.
#[derive(Debug, Deserialize, Clone)]
pub struct AutoSaveConfig {
    /// Quiet period after the last mutation of a slice before it is saved.
    /// Default: 1500.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Largest scene image kept inline as the project preview. Default: 256 KiB.
    #[serde(default = "default_preview_max_bytes")]
    pub preview_max_bytes: usize,
}

fn default_debounce_ms() -> u64 {
    1500
}
fn default_preview_max_bytes() -> usize {
    DEFAULT_PREVIEW_MAX_BYTES
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            preview_max_bytes: default_preview_max_bytes(),
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
