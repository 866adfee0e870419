mod v1;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/v1", v1::routes(config))
}
