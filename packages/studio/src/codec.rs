//! Portable single-document export and import of a whole project.
//!
//! The document inlines every binary payload, so it can run to hundreds of
//! megabytes. Export therefore streams pre-serialized fragments into a
//! writer one slice at a time instead of building the document in memory.

use std::collections::HashMap;
use std::io::Write;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::asset::{BlobWrite, dehydrate_slice, persist_blobs};
use crate::error::{Result, StudioError};
use crate::keys::SliceKind;
use crate::model::{
    CastMember, DEFAULT_PROJECT_TITLE, ProjectMetadata, Scene, SliceData, VideoJob, VoiceSlice,
    null_as_default,
};
use crate::project::{ProjectStore, write_slice};

/// Version tag written into every exported document.
pub const FORMAT_VERSION: &str = "1.0";

/// Suffix appended to the title of an imported project.
pub const IMPORTED_SUFFIX: &str = " (Imported)";

/// A parsed export document.
///
/// `metadata`, `cast` and `scenes` are required; everything else defaults,
/// whether missing or `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDocument {
    pub version: Option<String>,
    pub metadata: Option<ProjectMetadata>,
    pub cast: Option<Vec<CastMember>>,
    pub scenes: Option<Vec<Scene>>,
    #[serde(deserialize_with = "null_as_default")]
    pub voice: VoiceSlice,
    #[serde(deserialize_with = "null_as_default")]
    pub motion: Vec<VideoJob>,
}

impl ProjectDocument {
    /// Parse a document, rejecting anything that is not JSON or lacks a
    /// required section.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc: Self = serde_json::from_slice(bytes)
            .map_err(|e| StudioError::InvalidFormat(format!("not a project document: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("metadata", self.metadata.is_none()),
            ("cast", self.cast.is_none()),
            ("scenes", self.scenes.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StudioError::InvalidFormat(format!(
                "missing required section(s): {}",
                missing.join(", ")
            )))
        }
    }
}

fn write_array<W: Write, T: Serialize>(out: &mut W, items: &[T]) -> Result<()> {
    out.write_all(b"[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        serde_json::to_writer(&mut *out, item)?;
    }
    out.write_all(b"]")?;
    Ok(())
}

/// Stream a full, hydrated project document into `out`.
pub async fn export_to_writer<W: Write + Send>(
    store: &ProjectStore,
    user_id: &str,
    project_id: &str,
    out: &mut W,
) -> Result<()> {
    let metadata = store
        .registry()
        .find(user_id, project_id)
        .ok_or_else(|| StudioError::ProjectNotFound(project_id.to_string()))?;

    out.write_all(b"{\"version\":")?;
    serde_json::to_writer(&mut *out, FORMAT_VERSION)?;
    out.write_all(b",\"metadata\":")?;
    serde_json::to_writer(&mut *out, &metadata)?;

    // One slice resident at a time.
    out.write_all(b",\"cast\":")?;
    if let SliceData::Cast(cast) = store.load_slice(project_id, SliceKind::Cast).await {
        write_array(out, &cast)?;
    }
    out.write_all(b",\"scenes\":")?;
    if let SliceData::Scenes(scenes) = store.load_slice(project_id, SliceKind::Scenes).await {
        write_array(out, &scenes)?;
    }
    out.write_all(b",\"voice\":")?;
    if let SliceData::Voice(voice) = store.load_slice(project_id, SliceKind::Voice).await {
        serde_json::to_writer(&mut *out, &voice)?;
    }
    out.write_all(b",\"motion\":")?;
    if let SliceData::Motion(motion) = store.load_slice(project_id, SliceKind::Motion).await {
        write_array(out, &motion)?;
    }
    out.write_all(b"}")?;
    out.flush()?;

    info!(user_id = %user_id, project_id = %project_id, "Project exported");
    Ok(())
}

/// Export a project into an in-memory document.
pub async fn export_project(
    store: &ProjectStore,
    user_id: &str,
    project_id: &str,
) -> Result<String> {
    let mut buf = Vec::new();
    export_to_writer(store, user_id, project_id, &mut buf).await?;
    String::from_utf8(buf)
        .map_err(|e| StudioError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Give every entity a new id and rewrite the references between them.
///
/// Blob keys are `{kind}_{id}` across all projects, so keeping the source
/// ids would make the copy share payloads with the original.
fn reassign_ids(doc: &mut ProjectDocument) {
    let mut cast_ids = HashMap::new();
    for member in doc.cast.iter_mut().flatten() {
        let id = fresh_id();
        cast_ids.insert(std::mem::replace(&mut member.id, id.clone()), id);
    }
    let remap_cast = |id: &mut String| {
        if let Some(new) = cast_ids.get(id.as_str()) {
            *id = new.clone();
        }
    };

    let mut scene_ids = HashMap::new();
    for scene in doc.scenes.iter_mut().flatten() {
        let id = fresh_id();
        scene_ids.insert(std::mem::replace(&mut scene.id, id.clone()), id);
        scene.cast_ids.iter_mut().for_each(remap_cast);
    }

    for line in &mut doc.voice.lines {
        line.id = fresh_id();
        if let Some(speaker) = line.speaker_id.as_mut() {
            remap_cast(speaker);
        }
    }
    doc.voice.voice_map = std::mem::take(&mut doc.voice.voice_map)
        .into_iter()
        .map(|(mut cast_id, voice)| {
            remap_cast(&mut cast_id);
            (cast_id, voice)
        })
        .collect();

    for job in &mut doc.motion {
        job.id = fresh_id();
        if let Some(scene_id) = job.scene_id.as_mut() {
            if let Some(new) = scene_ids.get(scene_id.as_str()) {
                *scene_id = new.clone();
            }
        }
    }
}

/// Import a parsed document as a new project of `user_id`.
///
/// The project is added to the index before its slices and blobs are
/// written; an interrupted import leaves a visible project with some assets
/// missing.
pub async fn import_document(
    store: &ProjectStore,
    user_id: &str,
    mut doc: ProjectDocument,
) -> Result<ProjectMetadata> {
    doc.validate()?;
    match doc.version.as_deref() {
        Some(FORMAT_VERSION) => {}
        other => warn!(version = ?other, "Importing document with unexpected format version"),
    }
    reassign_ids(&mut doc);

    let ProjectDocument {
        metadata,
        cast,
        scenes,
        voice,
        motion,
        ..
    } = doc;
    let source = metadata.unwrap_or_default();
    let scenes = scenes.unwrap_or_default();

    let base_title = if source.title.trim().is_empty() {
        DEFAULT_PROJECT_TITLE
    } else {
        source.title.as_str()
    };
    let project = ProjectMetadata {
        id: Uuid::now_v7().to_string(),
        title: format!("{base_title}{IMPORTED_SUFFIX}"),
        last_modified: Utc::now(),
        preview_image: source.preview_image,
        scene_count: scenes.len(),
        owner_id: None,
        owner_email: None,
    };
    store.registry().insert(user_id, project.clone())?;

    let meta_store = &*store.stores().metadata;
    let mut writes: Vec<BlobWrite> = Vec::new();
    for slice in [
        SliceData::Cast(cast.unwrap_or_default()),
        SliceData::Scenes(scenes),
        SliceData::Voice(voice),
        SliceData::Motion(motion),
    ] {
        let (meta, slice_writes) = dehydrate_slice(slice);
        write_slice(meta_store, &project.id, &meta)?;
        writes.extend(slice_writes);
    }
    let blobs = persist_blobs(&*store.stores().blobs, &writes).await?;

    info!(
        user_id = %user_id,
        project_id = %project.id,
        blobs,
        "Project imported"
    );
    Ok(project)
}

/// Parse and import a raw document.
pub async fn import_project(
    store: &ProjectStore,
    user_id: &str,
    document: &[u8],
) -> Result<ProjectMetadata> {
    let doc = ProjectDocument::parse(document)?;
    import_document(store, user_id, doc).await
}
