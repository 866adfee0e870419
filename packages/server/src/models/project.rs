use serde::{Deserialize, Serialize};
use studio::{ProjectData, ProjectMetadata, SaveReport, SliceKind};

/// Query parameters for listing projects.
#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsQuery {
    /// List every user's projects. Admin only.
    #[serde(default)]
    pub all: bool,
}

/// A project's summary together with its hydrated contents.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub metadata: ProjectMetadata,
    pub data: ProjectData,
}

/// Acknowledgement of a slice update; the save itself happens later.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceAccepted {
    pub project_id: String,
    pub slice: SliceKind,
}

/// Result of an explicit flush.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    pub metadata: ProjectMetadata,
    pub saved: Vec<SlicePersisted>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlicePersisted {
    pub slice: SliceKind,
    #[serde(flatten)]
    pub report: SaveReport,
}
