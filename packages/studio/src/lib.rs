pub mod asset;
pub mod autosave;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod model;
pub mod project;
pub mod registry;

use std::io::Write;

use common::Stores;
use tracing::info;

pub use autosave::{AutoSaver, SaveEvent};
pub use config::AutoSaveConfig;
pub use error::{Result, StudioError};
pub use keys::{AssetKind, SliceKind};
pub use model::{ProjectData, ProjectManifest, ProjectMetadata, SliceData};
pub use project::{ProjectStore, SaveReport};
pub use registry::ProjectRegistry;

/// Entry point used by the server and the CLI.
#[derive(Clone)]
pub struct Studio {
    store: ProjectStore,
    autosave: AutoSaveConfig,
}

impl Studio {
    pub fn new(stores: Stores, autosave: AutoSaveConfig) -> Self {
        Self {
            store: ProjectStore::new(stores, autosave.preview_max_bytes),
            autosave,
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn registry(&self) -> &ProjectRegistry {
        self.store.registry()
    }

    pub fn list_projects(&self, user_id: &str, cross_user: bool) -> Vec<ProjectMetadata> {
        self.registry().list(user_id, cross_user)
    }

    pub fn create_project(
        &self,
        user_id: &str,
        manifest: Option<ProjectManifest>,
    ) -> Result<ProjectMetadata> {
        self.registry().create(user_id, manifest)
    }

    pub async fn load_project(&self, project_id: &str) -> ProjectData {
        self.store.load_project(project_id).await
    }

    pub async fn save_slice(
        &self,
        user_id: &str,
        project_id: &str,
        data: SliceData,
    ) -> Result<SaveReport> {
        self.store.save_slice(user_id, project_id, data).await
    }

    pub async fn export_project(&self, user_id: &str, project_id: &str) -> Result<String> {
        codec::export_project(&self.store, user_id, project_id).await
    }

    pub async fn export_to_writer<W: Write + Send>(
        &self,
        user_id: &str,
        project_id: &str,
        out: &mut W,
    ) -> Result<()> {
        codec::export_to_writer(&self.store, user_id, project_id, out).await
    }

    pub async fn import_project(&self, user_id: &str, document: &[u8]) -> Result<ProjectMetadata> {
        codec::import_project(&self.store, user_id, document).await
    }

    pub async fn delete_project(&self, user_id: &str, project_id: &str) -> Result<()> {
        self.registry().delete(user_id, project_id).await
    }

    pub async fn delete_all(&self, user_id: &str) -> Result<()> {
        self.registry().delete_all(user_id).await
    }

    /// Wipe both stores, for every user.
    pub async fn reset(&self) -> Result<()> {
        let stores = self.store.stores();
        stores.blobs.clear_assets().await?;
        let keys = stores.metadata.keys()?;
        for key in &keys {
            stores.metadata.remove(key)?;
        }
        info!(documents = keys.len(), "Stores reset");
        Ok(())
    }

    /// Open an existing project for editing: hydrate it and start its
    /// auto-saver.
    pub async fn open_session(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<(AutoSaver, ProjectData)> {
        if self.registry().find(user_id, project_id).is_none() {
            return Err(StudioError::ProjectNotFound(project_id.to_string()));
        }
        let saver = AutoSaver::new(self.store.clone(), user_id, project_id, &self.autosave);
        let data = saver.load().await;
        Ok((saver, data))
    }

    /// Auto-saver for a project just created in this process, which has
    /// nothing to hydrate.
    pub fn new_session(&self, user_id: &str, project_id: &str) -> AutoSaver {
        let saver = AutoSaver::new(self.store.clone(), user_id, project_id, &self.autosave);
        saver.mark_hydrated();
        saver
    }
}
