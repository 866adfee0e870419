use axum::Json;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde_json::Value;
use studio::{ProjectManifest, ProjectMetadata, SliceData, SliceKind};
use tracing::instrument;

use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::extractors::user::StudioUser;
use crate::models::project::{
    FlushResponse, ListProjectsQuery, ProjectResponse, SliceAccepted, SlicePersisted,
};
use crate::state::AppState;

/// Body limit for routes that carry inlined media.
pub fn media_body_limit(max_bytes: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_bytes)
}

fn find_project(
    state: &AppState,
    user: &StudioUser,
    project_id: &str,
) -> Result<ProjectMetadata, AppError> {
    state
        .studio
        .registry()
        .find(&user.id, project_id)
        .ok_or_else(|| AppError::NotFound(format!("Project '{project_id}' not found")))
}

fn record_user(state: &AppState, user: &StudioUser) -> Result<(), AppError> {
    state
        .studio
        .registry()
        .register_user(&user.id, user.email.as_deref())?;
    Ok(())
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_projects(
    user: StudioUser,
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<ProjectMetadata>>, AppError> {
    if query.all {
        user.require_admin()?;
    }
    Ok(Json(state.studio.list_projects(&user.id, query.all)))
}

/// The manifest is optional: an empty body creates an untitled project.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_project(
    user: StudioUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let manifest = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let manifest: ProjectManifest = serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid project manifest: {e}")))?;
        Some(manifest)
    };
    record_user(&state, &user)?;
    let project = state.studio.create_project(&user.id, manifest)?;
    state.sessions.start(&user.id, &project.id);

    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_project(
    user: StudioUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>, AppError> {
    find_project(&state, &user, &id)?;
    let data = state.sessions.load(&user.id, &id).await?;
    // Re-read: hydration does not change it, but a save may have.
    let metadata = find_project(&state, &user, &id)?;

    Ok(Json(ProjectResponse { metadata, data }))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn put_slice(
    user: StudioUser,
    State(state): State<AppState>,
    Path((id, slice)): Path<(String, String)>,
    AppJson(body): AppJson<Value>,
) -> Result<impl IntoResponse, AppError> {
    let kind: SliceKind = slice.parse().map_err(AppError::Validation)?;
    let data = SliceData::from_value(kind, body)
        .map_err(|e| AppError::Validation(format!("Invalid {kind} slice: {e}")))?;
    find_project(&state, &user, &id)?;

    let saver = state.sessions.open(&user.id, &id).await?;
    saver.set_slice(data);

    Ok((
        StatusCode::ACCEPTED,
        Json(SliceAccepted {
            project_id: id,
            slice: kind,
        }),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn flush_project(
    user: StudioUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlushResponse>, AppError> {
    find_project(&state, &user, &id)?;

    let mut saved = Vec::new();
    if let Some(saver) = state.sessions.get(&user.id, &id) {
        for slice in SliceKind::ALL {
            let report = saver.flush(slice).await?;
            saved.push(SlicePersisted { slice, report });
        }
    }
    let metadata = find_project(&state, &user, &id)?;

    Ok(Json(FlushResponse { metadata, saved }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn export_project(
    user: StudioUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Pending edits belong in the export.
    if let Some(saver) = state.sessions.get(&user.id, &id) {
        saver.flush_all().await?;
    }
    let document = state.studio.export_project(&user.id, &id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"cosmo-{id}.json\""),
            ),
        ],
        document,
    ))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, bytes = body.len()))]
pub async fn import_project(
    user: StudioUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    record_user(&state, &user)?;
    let project = state.studio.import_project(&user.id, &body).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_project(
    user: StudioUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(&user.id, &id).await;
    state.studio.delete_project(&user.id, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}
