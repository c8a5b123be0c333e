use std::sync::Arc;

use tokio_util::sync::CancellationToken;

mod app;
mod auth;
mod cancel;
mod config;
mod datasets;
mod db;
mod error;
mod extract;
mod response;
mod state;
#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::db::PgStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "csvdesk=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);

    let store = PgStore::connect(&config).await?;
    store.migrate().await?;

    let shutdown = CancellationToken::new();
    let state = AppState::from_pg(config.clone(), store.clone(), shutdown.clone());
    if !state.tokens.is_configured() {
        tracing::warn!("JWT_SECRET is not set; register works but login and protected routes will fail");
    }

    let app = app::build_app(state);
    app::serve(app, &config, shutdown).await?;

    store.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
