mod advisories;
mod app;
mod auth;
mod config;
mod db;
mod diagnoses;
mod error;
mod health;
mod identify;
mod state;
mod storage;
mod weather;

#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "cropdoc=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env()?;
    tracing::info!(environment = config.environment.as_str(), "starting cropdoc");

    let app_state = AppState::init(config).await?;

    match app_state.db.connect().await {
        Ok(()) => {
            if let Err(e) = app_state.resolver.seed_defaults().await {
                tracing::warn!(error = %e, "failed to seed default advisories");
            }
        }
        Err(e) if app_state.config.strict_startup => {
            tracing::error!(error = %e, "database unavailable at startup");
            return Err(e.into());
        }
        Err(e) => {
            tracing::warn!(error = %e, "database unavailable; running in degraded mode");
        }
    }

    let db = app_state.db.clone();
    let result = app::serve(app::build_app(app_state)).await;
    db.close().await;
    tracing::info!("shutdown complete");
    result
}
