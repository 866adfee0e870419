//! Debounced, per-slice persistence of an open project.
//!
//! Every mutation bumps its slice's generation and starts a sleeper task.
//! Only a sleeper whose generation is still current when it wakes saves, and
//! it saves the state as it is at that moment. Saves are serialized, and no
//! save runs until the project has been hydrated, so an empty in-memory
//! state never overwrites stored data.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::asset::{BlobWrite, dehydrate_slice};
use crate::config::AutoSaveConfig;
use crate::error::Result;
use crate::keys::SliceKind;
use crate::model::{ProjectData, SliceData};
use crate::project::{ProjectStore, SaveReport};

const EVENT_CAPACITY: usize = 64;

/// Blobs already known to be persisted, by key and payload length.
type Signature = (String, usize);

fn signature(write: &BlobWrite) -> Signature {
    (write.key.clone(), write.data.len())
}

/// Outcome of one background or explicit save.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaveEvent {
    Saved {
        slice: SliceKind,
        report: SaveReport,
    },
    Failed {
        slice: SliceKind,
        error: String,
        quota_exceeded: bool,
    },
}

struct Inner {
    store: ProjectStore,
    user_id: String,
    project_id: String,
    debounce: Duration,
    state: Mutex<ProjectData>,
    generations: Mutex<HashMap<SliceKind, u64>>,
    persisted: Mutex<HashSet<Signature>>,
    flush_lock: tokio::sync::Mutex<()>,
    hydrated: watch::Sender<bool>,
    closed: AtomicBool,
    events: broadcast::Sender<SaveEvent>,
}

/// Owns the in-memory state of one open project and keeps it saved.
#[derive(Clone)]
pub struct AutoSaver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AutoSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaver")
            .field("user_id", &self.inner.user_id)
            .field("project_id", &self.inner.project_id)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AutoSaver {
    pub fn new(
        store: ProjectStore,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        config: &AutoSaveConfig,
    ) -> Self {
        let (hydrated, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                user_id: user_id.into(),
                project_id: project_id.into(),
                debounce: config.debounce(),
                state: Mutex::new(ProjectData::default()),
                generations: Mutex::new(HashMap::new()),
                persisted: Mutex::new(HashSet::new()),
                flush_lock: tokio::sync::Mutex::new(()),
                hydrated,
                closed: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Hydrate the project from the stores, replace the in-memory state with
    /// it and open the hydration gate.
    pub async fn load(&self) -> ProjectData {
        let data = self.inner.store.load_project(&self.inner.project_id).await;

        // Whatever was just read back is already persisted.
        let mut known = HashSet::new();
        for kind in SliceKind::ALL {
            let (_, writes) = dehydrate_slice(data.slice(kind));
            known.extend(writes.iter().map(signature));
        }
        *lock(&self.inner.persisted) = known;
        *lock(&self.inner.state) = data.clone();

        self.mark_hydrated();
        debug!(project_id = %self.inner.project_id, "Session hydrated");
        data
    }

    /// Open the hydration gate without loading, for a brand-new project.
    pub fn mark_hydrated(&self) {
        self.inner.hydrated.send_replace(true);
    }

    pub fn is_hydrated(&self) -> bool {
        *self.inner.hydrated.borrow()
    }

    /// A copy of the current in-memory state.
    pub fn snapshot(&self) -> ProjectData {
        lock(&self.inner.state).clone()
    }

    /// Mutate the in-memory state and schedule a save of `kind`.
    pub fn update<R>(&self, kind: SliceKind, f: impl FnOnce(&mut ProjectData) -> R) -> R {
        let result = {
            let mut state = lock(&self.inner.state);
            f(&mut state)
        };
        self.schedule(kind);
        result
    }

    /// Replace one slice and schedule its save.
    pub fn set_slice(&self, data: SliceData) {
        self.update(data.kind(), |project| project.apply(data));
    }

    fn bump_generation(&self, kind: SliceKind) -> u64 {
        let mut generations = lock(&self.inner.generations);
        let generation = generations.entry(kind).or_default();
        *generation += 1;
        *generation
    }

    fn is_current(&self, kind: SliceKind, generation: u64) -> bool {
        lock(&self.inner.generations).get(&kind).copied() == Some(generation)
    }

    fn schedule(&self, kind: SliceKind) {
        let generation = self.bump_generation(kind);
        let saver = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(saver.inner.debounce).await;
            if !saver.is_current(kind, generation) {
                return;
            }
            // Failures are reported through the event channel.
            let _ = saver.save(kind).await;
        });
    }

    /// Save `kind` now, cancelling any pending debounced save of it.
    pub async fn flush(&self, kind: SliceKind) -> Result<SaveReport> {
        self.bump_generation(kind);
        self.save(kind).await
    }

    /// Save every slice now. Every slice is attempted; the first failure is
    /// returned.
    pub async fn flush_all(&self) -> Result<()> {
        let mut first_error = None;
        for kind in SliceKind::ALL {
            if let Err(e) = self.flush(kind).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop saving. Waits for an in-flight save to finish; pending and later
    /// saves become no-ops.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _guard = self.inner.flush_lock.lock().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    async fn save(&self, kind: SliceKind) -> Result<SaveReport> {
        let mut gate = self.inner.hydrated.subscribe();
        // The sender lives in `inner`, so the channel cannot close while we wait.
        let _ = gate.wait_for(|hydrated| *hydrated).await;

        let _guard = self.inner.flush_lock.lock().await;
        if self.inner.closed.load(Ordering::SeqCst) {
            debug!(project_id = %self.inner.project_id, slice = %kind, "Session closed, save dropped");
            return Ok(SaveReport::default());
        }

        let data = lock(&self.inner.state).slice(kind);
        let store = &self.inner.store;
        let summary = store.summary_for(&data);
        let (meta, writes) = dehydrate_slice(data);

        let (pending, skipped): (Vec<BlobWrite>, Vec<BlobWrite>) = {
            let persisted = lock(&self.inner.persisted);
            writes
                .into_iter()
                .partition(|w| !persisted.contains(&signature(w)))
        };
        for write in &skipped {
            debug!(key = %write.key, "Blob unchanged, skipping write");
        }

        let result = store
            .commit(
                &self.inner.user_id,
                &self.inner.project_id,
                &meta,
                &pending,
                summary,
            )
            .await;

        match result {
            Ok(mut report) => {
                lock(&self.inner.persisted).extend(pending.iter().map(signature));
                report.blobs_skipped = skipped.len();
                debug!(
                    project_id = %self.inner.project_id,
                    slice = %kind,
                    written = report.blobs_written,
                    skipped = report.blobs_skipped,
                    "Slice saved"
                );
                let _ = self.inner.events.send(SaveEvent::Saved {
                    slice: kind,
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                warn!(
                    project_id = %self.inner.project_id,
                    slice = %kind,
                    error = %e,
                    "Auto-save failed"
                );
                let _ = self.inner.events.send(SaveEvent::Failed {
                    slice: kind,
                    error: e.to_string(),
                    quota_exceeded: e.is_quota_exceeded(),
                });
                Err(e)
            }
        }
    }
}
