//! Open projects and their auto-savers, keyed by owner and project.

use std::sync::Arc;

use dashmap::DashMap;
use studio::{AutoSaver, ProjectData, Studio, StudioError};
use tracing::{info, warn};

type SessionKey = (String, String);

fn session_key(user_id: &str, project_id: &str) -> SessionKey {
    (user_id.to_string(), project_id.to_string())
}

#[derive(Clone)]
pub struct SessionManager {
    studio: Studio,
    sessions: Arc<DashMap<SessionKey, AutoSaver>>,
}

impl SessionManager {
    pub fn new(studio: Studio) -> Self {
        Self {
            studio,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, user_id: &str, project_id: &str) -> Option<AutoSaver> {
        self.sessions
            .get(&session_key(user_id, project_id))
            .map(|s| s.value().clone())
    }

    /// Start a session for a project created in this process.
    pub fn start(&self, user_id: &str, project_id: &str) -> AutoSaver {
        self.sessions
            .entry(session_key(user_id, project_id))
            .or_insert_with(|| self.studio.new_session(user_id, project_id))
            .value()
            .clone()
    }

    /// The open session of a project, hydrating it first if there is none.
    pub async fn open(&self, user_id: &str, project_id: &str) -> Result<AutoSaver, StudioError> {
        if let Some(saver) = self.get(user_id, project_id) {
            return Ok(saver);
        }

        let (saver, _) = self.studio.open_session(user_id, project_id).await?;
        // A concurrent open may have won; its state is as fresh as ours.
        let saver = self
            .sessions
            .entry(session_key(user_id, project_id))
            .or_insert(saver)
            .value()
            .clone();
        info!(user_id = %user_id, project_id = %project_id, "Session opened");
        Ok(saver)
    }

    /// Hydrated state of a project, through its session.
    pub async fn load(&self, user_id: &str, project_id: &str) -> Result<ProjectData, StudioError> {
        Ok(self.open(user_id, project_id).await?.snapshot())
    }

    /// Drop a session, waiting for its in-flight save. Pending saves are
    /// discarded.
    pub async fn close(&self, user_id: &str, project_id: &str) {
        if let Some((_, saver)) = self.sessions.remove(&session_key(user_id, project_id)) {
            saver.close().await;
            info!(user_id = %user_id, project_id = %project_id, "Session closed");
        }
    }

    /// Save and close every session, for shutdown.
    pub async fn shutdown(&self) {
        let savers: Vec<AutoSaver> = self.sessions.iter().map(|e| e.value().clone()).collect();
        self.sessions.clear();
        for saver in savers {
            if let Err(e) = saver.flush_all().await {
                warn!(project_id = %saver.project_id(), error = %e, "Final save failed");
            }
            saver.close().await;
        }
    }
}
