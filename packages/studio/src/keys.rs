//! Every storage key the studio reads or writes is derived here.
//!
//! Users and projects share one physical pair of stores, so these functions
//! are the only isolation between them.

use serde::{Deserialize, Serialize};

/// Prefix of each user's project index key.
pub const INDEX_KEY_PREFIX: &str = "cosmo_projects_";

/// Key of the known-users directory.
pub const USERS_KEY: &str = "cosmo_users";

/// Entity kinds whose binary payload lives in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Cast,
    Scene,
    Voice,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Scene => "scene",
            Self::Voice => "voice",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named partitions of a project's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceKind {
    Cast,
    Scenes,
    Voice,
    Motion,
    PromptDraft,
}

impl SliceKind {
    pub const ALL: [SliceKind; 5] = [
        Self::Cast,
        Self::Scenes,
        Self::Voice,
        Self::Motion,
        Self::PromptDraft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Scenes => "scenes",
            Self::Voice => "voice",
            Self::Motion => "motion",
            Self::PromptDraft => "prompt_draft",
        }
    }
}

impl std::fmt::Display for SliceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SliceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid slice '{}'. Must be one of: cast, scenes, voice, motion, prompt_draft",
                    s
                )
            })
    }
}

/// Blob key for an entity's binary payload: `{kind}_{id}`.
pub fn blob_key(kind: AssetKind, id: &str) -> String {
    format!("{}_{}", kind.as_str(), id)
}

/// Metadata key of one project slice: `{project}_{slice}`.
pub fn slice_key(project_id: &str, slice: SliceKind) -> String {
    format!("{}_{}", project_id, slice.as_str())
}

/// Metadata key of a user's project index.
pub fn index_key(user_id: &str) -> String {
    format!("{INDEX_KEY_PREFIX}{user_id}")
}

/// Inverse of [`index_key`].
pub fn user_from_index_key(key: &str) -> Option<&str> {
    key.strip_prefix(INDEX_KEY_PREFIX).filter(|u| !u.is_empty())
}
