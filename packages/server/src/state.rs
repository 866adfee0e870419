use std::sync::Arc;

use studio::Studio;

use crate::config::AppConfig;
use crate::sessions::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub studio: Studio,
    pub sessions: SessionManager,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(studio: Studio, config: AppConfig) -> Self {
        Self {
            sessions: SessionManager::new(studio.clone()),
            studio,
            config: Arc::new(config),
        }
    }
}
