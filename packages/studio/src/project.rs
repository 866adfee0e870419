use common::{MetadataStore, MetadataStoreExt, Stores};
use serde::Serialize;
use tracing::debug;

use crate::asset::{self, BlobWrite, dehydrate_slice, persist_blobs};
use crate::error::{Result, StudioError};
use crate::keys::{self, SliceKind};
use crate::model::{MetaUpdate, ProjectData, Scene, SliceData};
use crate::registry::ProjectRegistry;

/// Default upper bound for an inline preview thumbnail.
pub const DEFAULT_PREVIEW_MAX_BYTES: usize = 256 * 1024;

/// Read a slice as stored: binary fields are `null`.
///
/// Missing or malformed slices read as empty.
pub fn read_slice(meta: &dyn MetadataStore, project_id: &str, kind: SliceKind) -> SliceData {
    let key = keys::slice_key(project_id, kind);
    match kind {
        SliceKind::Cast => SliceData::Cast(meta.load(&key, Vec::new())),
        SliceKind::Scenes => SliceData::Scenes(meta.load(&key, Vec::new())),
        SliceKind::Voice => SliceData::Voice(meta.load(&key, Default::default())),
        SliceKind::Motion => SliceData::Motion(meta.load(&key, Vec::new())),
        SliceKind::PromptDraft => SliceData::PromptDraft(meta.load(&key, String::new())),
    }
}

/// Write a slice's metadata. The caller must have dehydrated it.
pub fn write_slice(meta: &dyn MetadataStore, project_id: &str, data: &SliceData) -> Result<()> {
    let key = keys::slice_key(project_id, data.kind());
    match data {
        SliceData::Cast(cast) => meta.save(&key, cast)?,
        SliceData::Scenes(scenes) => meta.save(&key, scenes)?,
        SliceData::Voice(voice) => meta.save(&key, voice)?,
        SliceData::Motion(motion) => meta.save(&key, motion)?,
        SliceData::PromptDraft(draft) => meta.save(&key, draft)?,
    }
    debug!(key = %key, "Slice written");
    Ok(())
}

/// Outcome of saving one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub blobs_written: usize,
    pub blobs_skipped: usize,
}

/// The cached summary fields derived from the scenes slice.
pub fn scene_summary(scenes: &[Scene], preview_max_bytes: usize) -> MetaUpdate {
    let preview = scenes
        .iter()
        .find_map(|s| s.image_url.as_deref())
        .filter(|image| image.len() <= preview_max_bytes)
        .map(String::from);
    MetaUpdate {
        scene_count: Some(scenes.len()),
        preview_image: Some(preview),
        ..Default::default()
    }
}

/// Loads and saves project slices through the two stores.
#[derive(Clone)]
pub struct ProjectStore {
    stores: Stores,
    registry: ProjectRegistry,
    preview_max_bytes: usize,
}

impl ProjectStore {
    pub fn new(stores: Stores, preview_max_bytes: usize) -> Self {
        Self {
            registry: ProjectRegistry::new(stores.clone()),
            stores,
            preview_max_bytes,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Load one slice with every binary field re-joined.
    pub async fn load_slice(&self, project_id: &str, kind: SliceKind) -> SliceData {
        let blobs = &*self.stores.blobs;
        match read_slice(&*self.stores.metadata, project_id, kind) {
            SliceData::Cast(cast) => SliceData::Cast(asset::hydrate_all(blobs, cast).await),
            SliceData::Scenes(scenes) => {
                SliceData::Scenes(asset::hydrate_all(blobs, scenes).await)
            }
            SliceData::Voice(voice) => SliceData::Voice(asset::hydrate_voice(blobs, voice).await),
            SliceData::Motion(motion) => {
                SliceData::Motion(asset::hydrate_all(blobs, motion).await)
            }
            draft @ SliceData::PromptDraft(_) => draft,
        }
    }

    /// Load every slice of a project, hydrating them concurrently.
    ///
    /// An unknown project loads as empty.
    pub async fn load_project(&self, project_id: &str) -> ProjectData {
        let (cast, scenes, voice, motion, draft) = futures::join!(
            self.load_slice(project_id, SliceKind::Cast),
            self.load_slice(project_id, SliceKind::Scenes),
            self.load_slice(project_id, SliceKind::Voice),
            self.load_slice(project_id, SliceKind::Motion),
            self.load_slice(project_id, SliceKind::PromptDraft),
        );
        let mut data = ProjectData::default();
        for slice in [cast, scenes, voice, motion, draft] {
            data.apply(slice);
        }
        data
    }

    /// Save one slice: metadata first, then every populated binary.
    ///
    /// Unlike the auto-saver this always rewrites every blob.
    pub async fn save_slice(
        &self,
        user_id: &str,
        project_id: &str,
        data: SliceData,
    ) -> Result<SaveReport> {
        let summary = self.summary_for(&data);
        let (meta, writes) = dehydrate_slice(data);
        self.commit(user_id, project_id, &meta, &writes, summary)
            .await
    }

    /// Summary update implied by saving `data`, computed before its binaries
    /// are stripped.
    pub(crate) fn summary_for(&self, data: &SliceData) -> MetaUpdate {
        match data {
            SliceData::Scenes(scenes) => scene_summary(scenes, self.preview_max_bytes),
            _ => MetaUpdate::default(),
        }
    }

    /// Write a dehydrated slice and the given blobs, then apply `summary` to
    /// the project's index entry (which also bumps `lastModified`).
    ///
    /// Fails with `ProjectNotFound` before writing anything when the project
    /// is not in the user's index.
    pub(crate) async fn commit(
        &self,
        user_id: &str,
        project_id: &str,
        meta: &SliceData,
        writes: &[BlobWrite],
        summary: MetaUpdate,
    ) -> Result<SaveReport> {
        if self.registry.find(user_id, project_id).is_none() {
            return Err(StudioError::ProjectNotFound(project_id.to_string()));
        }
        write_slice(&*self.stores.metadata, project_id, meta)?;
        let blobs_written = persist_blobs(&*self.stores.blobs, writes).await?;
        self.registry.update_meta(user_id, project_id, summary)?;
        Ok(SaveReport {
            blobs_written,
            blobs_skipped: 0,
        })
    }
}
