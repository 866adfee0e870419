use std::path::Path;

use common::StorageConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use studio::AutoSaveConfig;

/// The sections of the shared configuration file the CLI reads.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autosave: AutoSaveConfig,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(&path.to_string_lossy()).required(true),
            None => File::with_name("config/config").required(false),
        };
        let s = Config::builder()
            .add_source(file)
            // Override from environment (e.g., COSMO__STORAGE__DATA_DIR)
            .add_source(Environment::with_prefix("COSMO").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
