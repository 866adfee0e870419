use anyhow::Context;
use common::Stores;
use server::config::AppConfig;
use server::state::AppState;
use studio::Studio;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let stores = Stores::open(&config.storage)
        .await
        .context("Failed to open storage")?;
    info!(backend = ?config.storage.backend, data_dir = %config.storage.data_dir.display(), "Storage ready");

    let studio = Studio::new(stores, config.autosave.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(studio, config);
    let sessions = state.sessions.clone();
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    sessions.shutdown().await;
    Ok(())
}
