use axum::{
    Router,
    routing::{get, post, put},
};

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/projects", project_routes(config))
}

fn project_routes(config: &ServerConfig) -> Router<AppState> {
    let crud = Router::new()
        .route(
            "/",
            get(handlers::project::list_projects).post(handlers::project::create_project),
        )
        .route(
            "/{id}",
            get(handlers::project::get_project).delete(handlers::project::delete_project),
        )
        .route("/{id}/flush", post(handlers::project::flush_project))
        .route("/{id}/export", get(handlers::project::export_project));

    let media = Router::new()
        .route("/import", post(handlers::project::import_project))
        .route("/{id}/slices/{slice}", put(handlers::project::put_slice))
        .layer(handlers::project::media_body_limit(config.max_body_bytes));

    crud.merge(media)
}
