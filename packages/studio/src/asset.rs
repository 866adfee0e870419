//! Splitting binary payloads out of entities and joining them back.
//!
//! At rest an entity's binary field is always `null` in the metadata store
//! and the payload sits in the blob store under [`Asset::blob_key`].

use common::{BlobStore, StorageError};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::keys::{self, AssetKind};
use crate::model::{CastMember, Scene, ScriptLine, SliceData, VideoJob, VoiceSlice};

/// An entity with one large binary field.
pub trait Asset: Send {
    const KIND: AssetKind;

    fn id(&self) -> &str;

    fn binary(&self) -> Option<&str>;

    fn binary_mut(&mut self) -> &mut Option<String>;

    /// Blob key of this entity's payload. Derived, never stored.
    fn blob_key(&self) -> String {
        keys::blob_key(Self::KIND, self.id())
    }
}

macro_rules! impl_asset {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Asset for $ty {
            const KIND: AssetKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn binary(&self) -> Option<&str> {
                self.$field.as_deref()
            }

            fn binary_mut(&mut self) -> &mut Option<String> {
                &mut self.$field
            }
        }
    };
}

impl_asset!(CastMember, AssetKind::Cast, image);
impl_asset!(Scene, AssetKind::Scene, image_url);
impl_asset!(ScriptLine, AssetKind::Voice, audio_url);
impl_asset!(VideoJob, AssetKind::Video, video_url);

/// A pending blob write produced by dehydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobWrite {
    pub key: String,
    pub data: String,
}

/// Result of splitting one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Dehydrated<T> {
    /// The entity with its binary field set to `None`.
    pub meta: T,
    pub key: String,
    /// The payload to write, if the entity had one.
    pub blob: Option<String>,
}

impl<T> Dehydrated<T> {
    pub fn write(&self) -> Option<BlobWrite> {
        self.blob.as_ref().map(|data| BlobWrite {
            key: self.key.clone(),
            data: data.clone(),
        })
    }
}

/// Split an entity into its metadata and its payload.
pub fn dehydrate<T: Asset>(mut entity: T) -> Dehydrated<T> {
    let key = entity.blob_key();
    let blob = entity.binary_mut().take();
    Dehydrated {
        meta: entity,
        key,
        blob,
    }
}

/// Dehydrate every entity, returning the metadata list and the writes.
pub fn dehydrate_all<T: Asset>(entities: Vec<T>) -> (Vec<T>, Vec<BlobWrite>) {
    let mut metas = Vec::with_capacity(entities.len());
    let mut writes = Vec::new();
    for entity in entities {
        let Dehydrated { meta, key, blob } = dehydrate(entity);
        if let Some(data) = blob {
            writes.push(BlobWrite { key, data });
        }
        metas.push(meta);
    }
    (metas, writes)
}

/// Dehydrate a whole slice.
pub fn dehydrate_slice(data: SliceData) -> (SliceData, Vec<BlobWrite>) {
    match data {
        SliceData::Cast(cast) => {
            let (cast, writes) = dehydrate_all(cast);
            (SliceData::Cast(cast), writes)
        }
        SliceData::Scenes(scenes) => {
            let (scenes, writes) = dehydrate_all(scenes);
            (SliceData::Scenes(scenes), writes)
        }
        SliceData::Voice(voice) => {
            let (voice, writes) = dehydrate_voice(voice);
            (SliceData::Voice(voice), writes)
        }
        SliceData::Motion(motion) => {
            let (motion, writes) = dehydrate_all(motion);
            (SliceData::Motion(motion), writes)
        }
        draft @ SliceData::PromptDraft(_) => (draft, Vec::new()),
    }
}

pub fn dehydrate_voice(mut voice: VoiceSlice) -> (VoiceSlice, Vec<BlobWrite>) {
    let (lines, writes) = dehydrate_all(std::mem::take(&mut voice.lines));
    voice.lines = lines;
    (voice, writes)
}

/// Every blob key an entity in `data` could own, whether or not its
/// binary is currently populated.
pub fn slice_blob_keys(data: &SliceData) -> Vec<String> {
    match data {
        SliceData::Cast(cast) => cast.iter().map(Asset::blob_key).collect(),
        SliceData::Scenes(scenes) => scenes.iter().map(Asset::blob_key).collect(),
        SliceData::Voice(voice) => voice.lines.iter().map(Asset::blob_key).collect(),
        SliceData::Motion(motion) => motion.iter().map(Asset::blob_key).collect(),
        SliceData::PromptDraft(_) => Vec::new(),
    }
}

/// Re-join an entity with its payload.
///
/// A populated field is left alone. A missing blob, or a blob store error,
/// leaves the field `None`; neither is reported to the caller.
pub async fn hydrate<T: Asset>(blobs: &dyn BlobStore, mut entity: T) -> T {
    if entity.binary().is_some() {
        return entity;
    }
    let key = entity.blob_key();
    match blobs.get_asset(&key).await {
        Ok(Some(data)) => *entity.binary_mut() = Some(data),
        Ok(None) => debug!(key = %key, "No blob stored, leaving field empty"),
        Err(e) => warn!(key = %key, error = %e, "Blob read failed, leaving field empty"),
    }
    entity
}

/// Hydrate every entity concurrently. Order is preserved.
pub async fn hydrate_all<T: Asset>(blobs: &dyn BlobStore, entities: Vec<T>) -> Vec<T> {
    join_all(entities.into_iter().map(|e| hydrate(blobs, e))).await
}

pub async fn hydrate_voice(blobs: &dyn BlobStore, mut voice: VoiceSlice) -> VoiceSlice {
    voice.lines = hydrate_all(blobs, std::mem::take(&mut voice.lines)).await;
    voice
}

/// Issue every write concurrently and wait for all of them to settle.
///
/// Returns the number of payloads written, or the first failure once every
/// write has finished.
pub async fn persist_blobs(
    blobs: &dyn BlobStore,
    writes: &[BlobWrite],
) -> Result<usize, StorageError> {
    let results = join_all(writes.iter().map(|w| blobs.save_asset(&w.key, &w.data))).await;

    let mut written = 0;
    let mut first_error = None;
    for (write, result) in writes.iter().zip(results) {
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(key = %write.key, error = %e, "Blob write failed");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
