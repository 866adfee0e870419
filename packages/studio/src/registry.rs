use common::{MetadataStoreExt, Stores};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::asset::slice_blob_keys;
use crate::error::Result;
use crate::keys::{self, SliceKind, USERS_KEY};
use crate::model::{DEFAULT_PROJECT_TITLE, MetaUpdate, ProjectManifest, ProjectMetadata, UserRecord};
use crate::project::read_slice;

/// Owns each user's project index and the project lifecycle.
///
/// The index is the only authority on which projects exist. Slices or blobs
/// without an index entry are garbage.
#[derive(Clone)]
pub struct ProjectRegistry {
    stores: Stores,
}

impl ProjectRegistry {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Entries that fail to parse are skipped one by one, so a single bad
    /// entry cannot cost the rest of the index on the next save.
    fn load_index(&self, user_id: &str) -> Vec<ProjectMetadata> {
        let raw: Vec<Value> = self.stores.metadata.load(&keys::index_key(user_id), Vec::new());
        raw.into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(project) => Some(project),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Dropping malformed index entry");
                    None
                }
            })
            .collect()
    }

    fn save_index(&self, user_id: &str, index: &[ProjectMetadata]) -> Result<()> {
        self.stores.metadata.save(&keys::index_key(user_id), index)?;
        Ok(())
    }

    /// List a user's projects, or with `cross_user` every known user's
    /// projects, owner-decorated and newest first.
    pub fn list(&self, user_id: &str, cross_user: bool) -> Vec<ProjectMetadata> {
        if !cross_user {
            return self.load_index(user_id);
        }

        let mut all = Vec::new();
        for user in self.known_users() {
            for mut project in self.load_index(&user.id) {
                project.owner_id = Some(user.id.clone());
                project.owner_email = user.email.clone();
                all.push(project);
            }
        }
        // Stable, so equal timestamps keep their relative order.
        all.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        all
    }

    /// Users in the directory, followed by any user that has an index but
    /// never registered.
    pub fn known_users(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.stores.metadata.load(USERS_KEY, Vec::new());

        match self.stores.metadata.keys() {
            Ok(all_keys) => {
                for user_id in all_keys.iter().filter_map(|k| keys::user_from_index_key(k)) {
                    if !users.iter().any(|u| u.id == user_id) {
                        users.push(UserRecord {
                            id: user_id.to_string(),
                            email: None,
                        });
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to scan metadata keys for users"),
        }
        users
    }

    /// Record a user in the directory. An existing entry's email is updated
    /// when a new one is given.
    pub fn register_user(&self, user_id: &str, email: Option<&str>) -> Result<()> {
        let mut users: Vec<UserRecord> = self.stores.metadata.load(USERS_KEY, Vec::new());
        match users.iter_mut().find(|u| u.id == user_id) {
            Some(existing) => {
                if email.is_none() || existing.email.as_deref() == email {
                    return Ok(());
                }
                existing.email = email.map(String::from);
            }
            None => users.push(UserRecord {
                id: user_id.to_string(),
                email: email.map(String::from),
            }),
        }
        self.stores.metadata.save(USERS_KEY, &users)?;
        Ok(())
    }

    pub fn find(&self, user_id: &str, project_id: &str) -> Option<ProjectMetadata> {
        self.load_index(user_id)
            .into_iter()
            .find(|p| p.id == project_id)
    }

    /// Create an empty project at the head of the user's index.
    pub fn create(
        &self,
        user_id: &str,
        manifest: Option<ProjectManifest>,
    ) -> Result<ProjectMetadata> {
        let title = manifest
            .and_then(|m| m.title)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT_TITLE.to_string());
        let project = ProjectMetadata::new(Uuid::now_v7().to_string(), title);

        self.insert(user_id, project.clone())?;
        info!(user_id = %user_id, project_id = %project.id, "Project created");
        Ok(project)
    }

    /// Prepend an entry to the user's index.
    pub(crate) fn insert(&self, user_id: &str, project: ProjectMetadata) -> Result<()> {
        let mut index = self.load_index(user_id);
        index.insert(0, project);
        self.save_index(user_id, &index)
    }

    /// Merge `update` into a project's entry and bump `lastModified`.
    ///
    /// Unknown ids are ignored and yield `None`.
    pub fn update_meta(
        &self,
        user_id: &str,
        project_id: &str,
        update: MetaUpdate,
    ) -> Result<Option<ProjectMetadata>> {
        let mut index = self.load_index(user_id);
        let Some(entry) = index.iter_mut().find(|p| p.id == project_id) else {
            debug!(user_id = %user_id, project_id = %project_id, "Metadata update for unknown project ignored");
            return Ok(None);
        };
        entry.apply(update);
        let updated = entry.clone();
        self.save_index(user_id, &index)?;
        Ok(Some(updated))
    }

    /// Bump `lastModified` only.
    pub fn touch(&self, user_id: &str, project_id: &str) -> Result<Option<ProjectMetadata>> {
        self.update_meta(user_id, project_id, MetaUpdate::default())
    }

    /// Delete a project: its blobs first, then its slices, then its index
    /// entry. Deleting an unknown or already deleted project is a no-op.
    ///
    /// Slice and blob keys are not namespaced by user, so nothing is touched
    /// unless the project is in `user_id`'s own index.
    pub async fn delete(&self, user_id: &str, project_id: &str) -> Result<()> {
        if self.find(user_id, project_id).is_none() {
            debug!(user_id = %user_id, project_id = %project_id, "Delete of project outside the user's index ignored");
            return Ok(());
        }
        let meta = &*self.stores.metadata;
        let blob_keys: Vec<String> = [
            SliceKind::Cast,
            SliceKind::Scenes,
            SliceKind::Voice,
            SliceKind::Motion,
        ]
        .into_iter()
        .flat_map(|kind| slice_blob_keys(&read_slice(meta, project_id, kind)))
        .collect();

        let results = join_all(
            blob_keys
                .iter()
                .map(|key| self.stores.blobs.delete_asset(key)),
        )
        .await;
        for (key, result) in blob_keys.iter().zip(results) {
            if let Err(e) = result {
                warn!(key = %key, error = %e, "Blob delete failed, leaving orphan");
            }
        }

        for kind in SliceKind::ALL {
            meta.remove(&keys::slice_key(project_id, kind))?;
        }

        let mut index = self.load_index(user_id);
        index.retain(|p| p.id != project_id);
        self.save_index(user_id, &index)?;

        info!(
            user_id = %user_id,
            project_id = %project_id,
            blobs = blob_keys.len(),
            "Project deleted"
        );
        Ok(())
    }

    /// Delete every project of a user, then the index itself.
    pub async fn delete_all(&self, user_id: &str) -> Result<()> {
        for project in self.load_index(user_id) {
            self.delete(user_id, &project.id).await?;
        }
        self.stores.metadata.remove(&keys::index_key(user_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use common::BlobStore;
    use common::storage::memory::{MemoryBlobStore, MemoryMetadataStore};
    use std::sync::Arc;

    use super::*;
    use crate::model::{CastMember, Scene, ScriptLine, VideoJob, VoiceSlice};

    fn registry() -> (ProjectRegistry, Stores) {
        let stores = Stores::in_memory();
        (ProjectRegistry::new(stores.clone()), stores)
    }

    #[test]
    fn create_prepends_with_defaults() {
        let (registry, _) = registry();
        let first = registry.create("u1", None).unwrap();
        let second = registry
            .create(
                "u1",
                Some(ProjectManifest {
                    title: Some("Lighthouse".into()),
                }),
            )
            .unwrap();

        assert_eq!(first.title, DEFAULT_PROJECT_TITLE);
        assert_eq!(first.scene_count, 0);
        assert_eq!(first.preview_image, None);
        assert_ne!(first.id, second.id);

        let listed = registry.list("u1", false);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[0].title, "Lighthouse");
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn create_propagates_store_failure() {
        let stores = Stores {
            blobs: Arc::new(MemoryBlobStore::new()),
            metadata: Arc::new(MemoryMetadataStore::with_quota(10)),
        };
        let registry = ProjectRegistry::new(stores);
        let err = registry.create("u1", None).unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[test]
    fn users_are_isolated() {
        let (registry, _) = registry();
        registry.create("u1", None).unwrap();
        assert!(registry.list("u2", false).is_empty());
    }

    #[test]
    fn update_meta_merges_and_bumps() {
        let (registry, _) = registry();
        let project = registry.create("u1", None).unwrap();

        let updated = registry
            .update_meta(
                "u1",
                &project.id,
                MetaUpdate {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert!(updated.last_modified > project.last_modified);
        assert_eq!(registry.find("u1", &project.id).unwrap().title, "Renamed");
    }

    #[test]
    fn update_meta_ignores_stale_id() {
        let (registry, stores) = registry();
        registry.create("u1", None).unwrap();
        let before = stores.metadata.get_raw(&keys::index_key("u1")).unwrap();

        let result = registry.update_meta("u1", "gone", MetaUpdate::default()).unwrap();

        assert_eq!(result, None);
        assert_eq!(stores.metadata.get_raw(&keys::index_key("u1")).unwrap(), before);
    }

    #[test]
    fn cross_user_listing_sorts_newest_first() {
        let (registry, stores) = registry();
        registry.register_user("u1", Some("one@example.com")).unwrap();

        let base = Utc::now();
        let mut a = ProjectMetadata::new("a", "A");
        a.last_modified = base - TimeDelta::seconds(30);
        let mut b = ProjectMetadata::new("b", "B");
        b.last_modified = base;
        let mut c = ProjectMetadata::new("c", "C");
        c.last_modified = base - TimeDelta::seconds(10);
        let mut d = ProjectMetadata::new("d", "D");
        d.last_modified = base - TimeDelta::seconds(30);

        stores.metadata.save(&keys::index_key("u1"), &vec![a, b]).unwrap();
        // u2 never registered; found through its index key.
        stores.metadata.save(&keys::index_key("u2"), &vec![c, d]).unwrap();

        let all = registry.list("admin", true);
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);

        assert_eq!(all[0].owner_id.as_deref(), Some("u1"));
        assert_eq!(all[0].owner_email.as_deref(), Some("one@example.com"));
        assert_eq!(all[1].owner_id.as_deref(), Some("u2"));
        assert_eq!(all[1].owner_email, None);
        for pair in all.windows(2) {
            assert!(pair[0].last_modified >= pair[1].last_modified);
        }

        // Decorations never leak into the stored index.
        assert!(registry.list("u1", false).iter().all(|p| p.owner_id.is_none()));
    }

    #[test]
    fn register_user_updates_email_once() {
        let (registry, stores) = registry();
        registry.register_user("u1", None).unwrap();
        registry.register_user("u1", Some("a@example.com")).unwrap();
        registry.register_user("u1", None).unwrap();

        let users: Vec<UserRecord> = stores.metadata.load(USERS_KEY, Vec::new());
        assert_eq!(
            users,
            vec![UserRecord {
                id: "u1".into(),
                email: Some("a@example.com".into())
            }]
        );
    }

    async fn seed_project(stores: &Stores, project_id: &str) {
        let meta = &stores.metadata;
        meta.save(
            &keys::slice_key(project_id, SliceKind::Cast),
            &vec![CastMember {
                id: format!("{project_id}-c1"),
                ..Default::default()
            }],
        )
        .unwrap();
        meta.save(
            &keys::slice_key(project_id, SliceKind::Scenes),
            &vec![Scene {
                id: format!("{project_id}-s1"),
                ..Default::default()
            }],
        )
        .unwrap();
        meta.save(
            &keys::slice_key(project_id, SliceKind::Voice),
            &VoiceSlice {
                lines: vec![ScriptLine {
                    id: format!("{project_id}-l1"),
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .unwrap();
        meta.save(
            &keys::slice_key(project_id, SliceKind::Motion),
            &vec![VideoJob {
                id: format!("{project_id}-v1"),
                ..Default::default()
            }],
        )
        .unwrap();
        meta.save(&keys::slice_key(project_id, SliceKind::PromptDraft), "draft")
            .unwrap();

        for key in [
            format!("cast_{project_id}-c1"),
            format!("scene_{project_id}-s1"),
            format!("voice_{project_id}-l1"),
            format!("video_{project_id}-v1"),
        ] {
            stores.blobs.save_asset(&key, "data:payload").await.unwrap();
        }
    }

    #[tokio::test]
    async fn delete_cascades_and_is_idempotent() {
        let (registry, stores) = registry();
        let keep = registry.create("u1", None).unwrap();
        let doomed = registry.create("u1", None).unwrap();
        seed_project(&stores, &keep.id).await;
        seed_project(&stores, &doomed.id).await;

        registry.delete("u1", &doomed.id).await.unwrap();

        for (kind, suffix) in [("cast", "c1"), ("scene", "s1"), ("voice", "l1"), ("video", "v1")] {
            let key = format!("{kind}_{}-{suffix}", doomed.id);
            assert_eq!(stores.blobs.get_asset(&key).await.unwrap(), None);
            let kept = format!("{kind}_{}-{suffix}", keep.id);
            assert!(stores.blobs.get_asset(&kept).await.unwrap().is_some());
        }
        for kind in SliceKind::ALL {
            assert_eq!(
                stores
                    .metadata
                    .get_raw(&keys::slice_key(&doomed.id, kind))
                    .unwrap(),
                None
            );
        }
        let ids: Vec<String> = registry.list("u1", false).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![keep.id.clone()]);

        let index_before = stores.metadata.get_raw(&keys::index_key("u1")).unwrap();
        registry.delete("u1", &doomed.id).await.unwrap();
        assert_eq!(
            stores.metadata.get_raw(&keys::index_key("u1")).unwrap(),
            index_before
        );
    }

    #[tokio::test]
    async fn delete_of_another_users_project_touches_nothing() {
        let (registry, stores) = registry();
        let project = registry.create("u1", None).unwrap();
        seed_project(&stores, &project.id).await;
        let cast_before = stores
            .metadata
            .get_raw(&keys::slice_key(&project.id, SliceKind::Cast))
            .unwrap();

        registry.delete("u2", &project.id).await.unwrap();

        assert!(registry.find("u1", &project.id).is_some());
        assert_eq!(
            stores
                .metadata
                .get_raw(&keys::slice_key(&project.id, SliceKind::Cast))
                .unwrap(),
            cast_before
        );
        assert_eq!(
            stores
                .blobs
                .get_asset(&format!("cast_{}-c1", project.id))
                .await
                .unwrap()
                .as_deref(),
            Some("data:payload")
        );
        assert_eq!(stores.metadata.get_raw(&keys::index_key("u2")).unwrap(), None);
    }

    #[test]
    fn one_malformed_index_entry_does_not_erase_the_rest() {
        let (registry, stores) = registry();
        stores
            .metadata
            .set_raw(
                &keys::index_key("u1"),
                r#"[{"id": "keep", "title": "Kept", "lastModified": 1700000000000}, "garbage"]"#,
            )
            .unwrap();

        registry.create("u1", None).unwrap();

        let ids: Vec<String> = registry.list("u1", false).into_iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1], "keep");
    }

    #[tokio::test]
    async fn delete_all_removes_index() {
        let (registry, stores) = registry();
        let a = registry.create("u1", None).unwrap();
        let b = registry.create("u1", None).unwrap();
        seed_project(&stores, &a.id).await;
        seed_project(&stores, &b.id).await;
        registry.create("u2", None).unwrap();

        registry.delete_all("u1").await.unwrap();

        assert!(registry.list("u1", false).is_empty());
        assert_eq!(stores.metadata.get_raw(&keys::index_key("u1")).unwrap(), None);
        assert_eq!(registry.list("u2", false).len(), 1);
        assert_eq!(
            stores
                .blobs
                .get_asset(&format!("cast_{}-c1", a.id))
                .await
                .unwrap(),
            None
        );
    }
}
