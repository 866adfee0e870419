use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::keys::SliceKind;

/// Title given to projects created without a manifest title.
pub const DEFAULT_PROJECT_TITLE: &str = "Untitled Project";

/// Read an explicit `null` as the field's default, the same as a missing
/// field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `lastModified` as epoch milliseconds.
mod epoch_millis {
    use chrono::{DateTime, Utc};
    use serde::de::{self, Deserialize, Deserializer};
    use serde::Serializer;
    use serde_json::Value;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(at.timestamp_millis())
    }

    /// Accepts integer or fractional milliseconds. `null` reads as the epoch.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let millis = match Value::deserialize(deserializer)? {
            Value::Null => return Ok(DateTime::default()),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            _ => None,
        };
        millis
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| de::Error::custom("expected a unix timestamp in milliseconds"))
    }
}

/// A character of the project's cast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CastMember {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub voice: Option<String>,
    /// Portrait data URI. Always `null` at rest.
    pub image: Option<String>,
    /// Fields this version does not know about, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An illustrated scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub prompt: String,
    /// Cast members appearing in the scene.
    #[serde(deserialize_with = "null_as_default")]
    pub cast_ids: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub approved: bool,
    /// Rendered image data URI. Always `null` at rest.
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptLine {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Cast member speaking the line.
    pub speaker_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    /// Synthesized speech data URI. Always `null` at rest.
    pub audio_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `voice` slice: the raw script, voice casting and parsed lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceSlice {
    #[serde(deserialize_with = "null_as_default")]
    pub script_text: String,
    /// Cast member id to synthesis voice name.
    #[serde(deserialize_with = "null_as_default")]
    pub voice_map: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub lines: Vec<ScriptLine>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An animation job turning a scene into a clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoJob {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    pub scene_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: JobStatus,
    /// Rendered clip data URI. Always `null` at rest.
    pub video_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Summary of one project, as kept in a user's index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, with = "epoch_millis")]
    pub last_modified: DateTime<Utc>,
    /// Small thumbnail kept inline so list views need no blob fetch.
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scene_count: usize,
    /// Set only on entries returned by a cross-user listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

impl ProjectMetadata {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            last_modified: Utc::now(),
            ..Default::default()
        }
    }

    /// Advance `last_modified`, strictly, even if the clock has not moved.
    pub fn touch(&mut self) {
        let floor = self.last_modified + TimeDelta::milliseconds(1);
        self.last_modified = Utc::now().max(floor);
    }

    /// Apply a partial update and advance `last_modified`.
    pub fn apply(&mut self, update: MetaUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(preview) = update.preview_image {
            self.preview_image = preview;
        }
        if let Some(count) = update.scene_count {
            self.scene_count = count;
        }
        self.touch();
    }
}

/// Partial update of a [`ProjectMetadata`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the preview.
    pub preview_image: Option<Option<String>>,
    pub scene_count: Option<usize>,
}

/// Optional settings for a new project.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectManifest {
    pub title: Option<String>,
}

/// Entry of the known-users directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Every slice of one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectData {
    #[serde(deserialize_with = "null_as_default")]
    pub cast: Vec<CastMember>,
    #[serde(deserialize_with = "null_as_default")]
    pub scenes: Vec<Scene>,
    #[serde(deserialize_with = "null_as_default")]
    pub voice: VoiceSlice,
    #[serde(deserialize_with = "null_as_default")]
    pub motion: Vec<VideoJob>,
    #[serde(deserialize_with = "null_as_default")]
    pub prompt_draft: String,
}

impl ProjectData {
    /// Clone one slice out.
    pub fn slice(&self, kind: SliceKind) -> SliceData {
        match kind {
            SliceKind::Cast => SliceData::Cast(self.cast.clone()),
            SliceKind::Scenes => SliceData::Scenes(self.scenes.clone()),
            SliceKind::Voice => SliceData::Voice(self.voice.clone()),
            SliceKind::Motion => SliceData::Motion(self.motion.clone()),
            SliceKind::PromptDraft => SliceData::PromptDraft(self.prompt_draft.clone()),
        }
    }

    /// Replace one slice.
    pub fn apply(&mut self, data: SliceData) {
        match data {
            SliceData::Cast(cast) => self.cast = cast,
            SliceData::Scenes(scenes) => self.scenes = scenes,
            SliceData::Voice(voice) => self.voice = voice,
            SliceData::Motion(motion) => self.motion = motion,
            SliceData::PromptDraft(draft) => self.prompt_draft = draft,
        }
    }
}

/// The contents of a single slice.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceData {
    Cast(Vec<CastMember>),
    Scenes(Vec<Scene>),
    Voice(VoiceSlice),
    Motion(Vec<VideoJob>),
    PromptDraft(String),
}

impl SliceData {
    pub fn kind(&self) -> SliceKind {
        match self {
            Self::Cast(_) => SliceKind::Cast,
            Self::Scenes(_) => SliceKind::Scenes,
            Self::Voice(_) => SliceKind::Voice,
            Self::Motion(_) => SliceKind::Motion,
            Self::PromptDraft(_) => SliceKind::PromptDraft,
        }
    }

    /// Parse the JSON body of a slice of the given kind.
    pub fn from_value(kind: SliceKind, value: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            SliceKind::Cast => Self::Cast(serde_json::from_value(value)?),
            SliceKind::Scenes => Self::Scenes(serde_json::from_value(value)?),
            SliceKind::Voice => Self::Voice(serde_json::from_value(value)?),
            SliceKind::Motion => Self::Motion(serde_json::from_value(value)?),
            SliceKind::PromptDraft => Self::PromptDraft(serde_json::from_value(value)?),
        })
    }
}
