use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    middleware, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::{AppConfig, StorageBackend};
use crate::state::AppState;
use crate::{advisories, auth, diagnoses, error, health};

fn cors(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    if config.allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}

pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    let mut router = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(diagnoses::router(config.storage.max_upload_bytes))
        .merge(advisories::router())
        .layer(middleware::from_fn_with_state(state.clone(), error::redact_details))
        .with_state(state);

    if config.storage.backend == StorageBackend::Local {
        router = router.nest_service(
            config.storage.public_prefix.trim_end_matches('/'),
            ServeDir::new(&config.storage.upload_dir),
        );
    }

    router.layer(cors(&config)).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    let latency_ms = latency.as_millis() as u64;
                    if status.is_server_error() {
                        tracing::error!(%status, latency_ms, "response");
                    } else {
                        tracing::info!(%status, latency_ms, "response");
                    }
                },
            ),
    )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
