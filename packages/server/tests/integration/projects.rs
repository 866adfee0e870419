use serde_json::json;

use crate::common::{TestApp, admin, routes, user};

mod identity {
    use super::*;

    #[tokio::test]
    async fn requests_without_user_header_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get_anonymous(routes::PROJECTS).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "USER_MISSING");
    }

    #[tokio::test]
    async fn users_only_see_their_own_projects() {
        let app = TestApp::spawn().await;
        let mine = app.create_project(user("alice"), "Mine").await;
        app.create_project(user("bob"), "Theirs").await;

        let res = app.get(routes::PROJECTS, user("alice")).await;
        assert_eq!(res.status, 200);
        let list = res.body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], mine.as_str());

        let res = app.get(&routes::project(&mine), user("bob")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn cross_user_listing_requires_admin() {
        let app = TestApp::spawn().await;
        app.create_project(user("alice"), "First").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newest = app.create_project(user("bob"), "Second").await;

        let res = app.get(routes::ALL_PROJECTS, user("alice")).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.code(), "PERMISSION_DENIED");

        let res = app.get(routes::ALL_PROJECTS, admin("root")).await;
        assert_eq!(res.status, 200);
        let list = res.body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"], newest.as_str());
        assert_eq!(list[0]["ownerId"], "bob");
        assert_eq!(list[1]["ownerId"], "alice");
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn create_without_body_uses_default_title() {
        let app = TestApp::spawn().await;

        let res = app.post_raw(routes::PROJECTS, Vec::new(), user("alice")).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["title"], "Untitled Project");
        assert_eq!(res.body["sceneCount"], 0);
        assert!(res.body["lastModified"].is_i64());
    }

    #[tokio::test]
    async fn newest_project_is_listed_first() {
        let app = TestApp::spawn().await;
        let first = app.create_project(user("alice"), "First").await;
        let second = app.create_project(user("alice"), "Second").await;

        let res = app.get(routes::PROJECTS, user("alice")).await;
        let ids: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_removes_assets() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Doomed").await;
        let res = app
            .put(
                &routes::slice(&id, "cast"),
                &json!([{"id": "c-doomed", "name": "Ada", "image": "data:AAA"}]),
                user("alice"),
            )
            .await;
        assert_eq!(res.status, 202);
        let res = app.post(&routes::flush(&id), &json!({}), user("alice")).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.delete(&routes::project(&id), user("alice")).await;
        assert_eq!(res.status, 204);
        let res = app.delete(&routes::project(&id), user("alice")).await;
        assert_eq!(res.status, 204);

        let res = app.get(&routes::project(&id), user("alice")).await;
        assert_eq!(res.status, 404);
        let blob = app
            .state
            .studio
            .store()
            .stores()
            .blobs
            .get_asset("cast_c-doomed")
            .await
            .unwrap();
        assert_eq!(blob, None);
        assert!(app.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn deleting_another_users_project_leaves_it_intact() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Guarded").await;
        app.put(
            &routes::slice(&id, "cast"),
            &json!([{"id": "c-guarded", "name": "Ada", "image": "data:AAA"}]),
            user("alice"),
        )
        .await;
        let res = app.post(&routes::flush(&id), &json!({}), user("alice")).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.delete(&routes::project(&id), user("bob")).await;
        assert_eq!(res.status, 204);

        let blob = app
            .state
            .studio
            .store()
            .stores()
            .blobs
            .get_asset("cast_c-guarded")
            .await
            .unwrap();
        assert_eq!(blob.as_deref(), Some("data:AAA"));
        let res = app.get(&routes::project(&id), user("alice")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"]["cast"][0]["image"], "data:AAA");
    }
}

mod slices {
    use super::*;

    #[tokio::test]
    async fn slice_updates_are_autosaved_and_reloaded() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Harbour").await;

        let res = app
            .put(
                &routes::slice(&id, "cast"),
                &json!([{"id": "c1", "name": "Ada", "image": "data:image/png;base64,AAA"}]),
                user("alice"),
            )
            .await;
        assert_eq!(res.status, 202, "{}", res.text);
        assert_eq!(res.body["slice"], "cast");

        app.settle().await;

        // Straight from the stores, bypassing the open session.
        let data = app.state.studio.load_project(&id).await;
        assert_eq!(data.cast[0].image.as_deref(), Some("data:image/png;base64,AAA"));

        let res = app.get(&routes::project(&id), user("alice")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"]["cast"][0]["name"], "Ada");
        assert_eq!(res.body["metadata"]["title"], "Harbour");
    }

    #[tokio::test]
    async fn flush_saves_immediately_and_updates_summary() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Storyboard").await;

        app.put(
            &routes::slice(&id, "scenes"),
            &json!([
                {"id": "s1", "title": "Dawn", "imageUrl": "data:dawn"},
                {"id": "s2", "title": "Dusk"}
            ]),
            user("alice"),
        )
        .await;
        let res = app.post(&routes::flush(&id), &json!({}), user("alice")).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["metadata"]["sceneCount"], 2);
        assert_eq!(res.body["metadata"]["previewImage"], "data:dawn");
        let scenes = res.body["saved"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["slice"] == "scenes")
            .unwrap();
        assert_eq!(scenes["blobsWritten"], 1);
    }

    #[tokio::test]
    async fn unknown_slice_or_bad_body_is_rejected() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Strict").await;

        let res = app
            .put(&routes::slice(&id, "soundtrack"), &json!([]), user("alice"))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");

        let res = app
            .put(&routes::slice(&id, "cast"), &json!({"not": "a list"}), user("alice"))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn slices_of_unknown_projects_are_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .put(&routes::slice("missing", "cast"), &json!([]), user("alice"))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn exhausted_quota_is_reported() {
        use std::sync::Arc;

        use ::common::Stores;
        use ::common::storage::memory::{MemoryBlobStore, MemoryMetadataStore};

        let app = TestApp::spawn_with(Stores {
            blobs: Arc::new(MemoryBlobStore::with_quota(8)),
            metadata: Arc::new(MemoryMetadataStore::new()),
        })
        .await;
        let id = app.create_project(user("alice"), "Huge").await;

        app.put(
            &routes::slice(&id, "cast"),
            &json!([{"id": "c1", "name": "Ada", "image": "data:far-beyond-the-quota"}]),
            user("alice"),
        )
        .await;
        let res = app.post(&routes::flush(&id), &json!({}), user("alice")).await;

        assert_eq!(res.status, 507);
        assert_eq!(res.code(), "QUOTA_EXCEEDED");
    }
}

mod portability {
    use super::*;

    #[tokio::test]
    async fn export_then_import_creates_an_independent_copy() {
        let app = TestApp::spawn().await;
        let id = app.create_project(user("alice"), "Voyage").await;
        app.put(
            &routes::slice(&id, "voice"),
            &json!({
                "scriptText": "ADA: Land ho",
                "voiceMap": {"c1": "Kore"},
                "lines": [{"id": "l1", "speakerId": "c1", "text": "Land ho", "audioUrl": "data:ho"}]
            }),
            user("alice"),
        )
        .await;

        let res = app.get(&routes::export(&id), user("alice")).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let disposition = res.headers["content-disposition"].to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert_eq!(res.body["version"], "1.0");
        assert_eq!(res.body["voice"]["lines"][0]["audioUrl"], "data:ho");

        let res = app
            .post_raw(routes::IMPORT, res.text.into_bytes(), user("bob"))
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["title"], "Voyage (Imported)");
        let copy = res.id();
        assert_ne!(copy, id);

        let res = app.get(&routes::project(&copy), user("bob")).await;
        let line = &res.body["data"]["voice"]["lines"][0];
        assert_eq!(line["audioUrl"], "data:ho");
        assert_ne!(line["id"], "l1");
    }

    #[tokio::test]
    async fn importing_garbage_is_an_invalid_format() {
        let app = TestApp::spawn().await;

        let res = app
            .post_raw(routes::IMPORT, b"{\"version\": \"1.0\"}".to_vec(), user("alice"))
            .await;

        assert_eq!(res.status, 422);
        assert_eq!(res.code(), "INVALID_FORMAT");
        let res = app.get(routes::PROJECTS, user("alice")).await;
        assert_eq!(res.body, json!([]));
    }

    #[tokio::test]
    async fn exporting_an_unknown_project_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::export("missing"), user("alice")).await;

        assert_eq!(res.status, 404);
    }
}
