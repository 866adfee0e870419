use std::net::SocketAddr;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use server::config::{AppConfig, CorsConfig, ServerConfig};
use server::state::AppState;
use studio::{AutoSaveConfig, Studio};

pub mod routes {
    pub const PROJECTS: &str = "/api/v1/projects";
    pub const ALL_PROJECTS: &str = "/api/v1/projects?all=true";
    pub const IMPORT: &str = "/api/v1/projects/import";

    pub fn project(id: &str) -> String {
        format!("/api/v1/projects/{id}")
    }

    pub fn slice(id: &str, slice: &str) -> String {
        format!("/api/v1/projects/{id}/slices/{slice}")
    }

    pub fn flush(id: &str) -> String {
        format!("/api/v1/projects/{id}/flush")
    }

    pub fn export(id: &str) -> String {
        format!("/api/v1/projects/{id}/export")
    }
}

/// Debounce short enough for tests to wait out in real time.
pub const TEST_DEBOUNCE_MS: u64 = 20;

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: AppState,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
    pub headers: reqwest::header::HeaderMap,
}

/// Caller identity sent as headers.
#[derive(Clone, Copy)]
pub struct As<'a> {
    pub user: &'a str,
    pub admin: bool,
}

pub fn user(id: &str) -> As<'_> {
    As {
        user: id,
        admin: false,
    }
}

pub fn admin(id: &str) -> As<'_> {
    As {
        user: id,
        admin: true,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(::common::Stores::in_memory()).await
    }

    pub async fn spawn_with(stores: ::common::Stores) -> Self {
        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig::default(),
                max_body_bytes: 16 * 1024 * 1024,
            },
            storage: Default::default(),
            autosave: AutoSaveConfig {
                debounce_ms: TEST_DEBOUNCE_MS,
                ..Default::default()
            },
        };
        let studio = Studio::new(stores, app_config.autosave.clone());
        let state = AppState::new(studio, app_config);

        let app = server::build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn identify(req: RequestBuilder, who: Option<As<'_>>) -> RequestBuilder {
        match who {
            Some(who) => {
                let req = req.header("X-User-Id", who.user);
                if who.admin {
                    req.header("X-User-Role", "admin")
                } else {
                    req
                }
            }
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> TestResponse {
        let res = req.send().await.expect("Failed to send request");
        TestResponse::from_response(res).await
    }

    pub async fn get(&self, path: &str, who: As<'_>) -> TestResponse {
        Self::send(Self::identify(self.client.get(self.url(path)), Some(who))).await
    }

    pub async fn get_anonymous(&self, path: &str) -> TestResponse {
        Self::send(Self::identify(self.client.get(self.url(path)), None)).await
    }

    pub async fn post(&self, path: &str, body: &Value, who: As<'_>) -> TestResponse {
        Self::send(Self::identify(self.client.post(self.url(path)).json(body), Some(who))).await
    }

    pub async fn post_raw(&self, path: &str, body: Vec<u8>, who: As<'_>) -> TestResponse {
        Self::send(Self::identify(self.client.post(self.url(path)).body(body), Some(who))).await
    }

    pub async fn put(&self, path: &str, body: &Value, who: As<'_>) -> TestResponse {
        Self::send(Self::identify(self.client.put(self.url(path)).json(body), Some(who))).await
    }

    pub async fn delete(&self, path: &str, who: As<'_>) -> TestResponse {
        Self::send(Self::identify(self.client.delete(self.url(path)), Some(who))).await
    }

    /// Create a project via the API and return its `id`.
    pub async fn create_project(&self, who: As<'_>, title: &str) -> String {
        let res = self
            .post(routes::PROJECTS, &serde_json::json!({"title": title}), who)
            .await;
        assert_eq!(res.status, 201, "create_project failed: {}", res.text);
        res.id()
    }

    /// Wait long enough for every pending debounced save to run.
    pub async fn settle(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(TEST_DEBOUNCE_MS * 10)).await;
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            text,
            body,
            headers,
        }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("response body should contain 'id'")
            .to_string()
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}
