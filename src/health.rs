use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api-info", get(api_info))
}

fn configured(yes: bool) -> &'static str {
    if yes {
        "configured"
    } else {
        "not_configured"
    }
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let advisory_mode = if state.resolver.generator_configured() {
        "Gemini AI"
    } else {
        "Fallback Mode"
    };
    let detection_mode = match state.identifier.mode() {
        "mock" => "Mock Mode",
        _ => "Kindwise API",
    };
    let database = if state.db.is_connected() { "connected" } else { "disconnected" };
    Json(json!({
        "message": "Crop Disease Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "features": {
            "disease_detection": detection_mode,
            "advisory_generation": advisory_mode,
            "database": database,
        },
        "endpoints": {
            "disease_detection": "/disease/predict",
            "diagnosis_history": "/disease/history",
            "advisory": "/advisory/disease/{disease_name}",
            "weather_advice": "/advisory/weather",
        },
    }))
}

/// Re-probes the database when it is believed to be up.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let mut db_connected = state.db.is_connected();
    if db_connected {
        if let Err(e) = state.db.ensure_connection().await {
            warn!(error = %e, "health check could not restore database connection");
            db_connected = false;
        }
    }
    let generator = state.resolver.generator_configured();
    let (status, message) = if db_connected && generator {
        ("healthy", "All systems operational")
    } else {
        ("degraded", "Some services unavailable")
    };

    let mut body = json!({
        "status": status,
        "environment": state.config.environment.as_str(),
        "message": message,
    });
    if !state.config.is_production() {
        let database = if db_connected { "connected" } else { "disconnected" };
        body["services"] = json!({
            "database": database,
            "kindwise_api": configured(state.identifier.mode() != "mock"),
            "gemini_ai": configured(generator),
            "weather_api": configured(state.weather.is_configured()),
        });
    }
    Json(body)
}

/// Provider configuration and fallbacks; withheld in production.
pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    if state.config.is_production() {
        return Json(json!({
            "message": "API information endpoint disabled in production",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
    Json(json!({
        "kindwise_api": {
            "configured": state.identifier.mode() != "mock",
            "purpose": "Disease detection from crop images",
            "fallback": "Mock predictions available when not configured",
        },
        "gemini_ai": {
            "configured": state.resolver.generator_configured(),
            "model": state.config.gemini.model,
            "purpose": "Generate comprehensive disease advisories",
            "fallback": "Built-in advisories available when not configured",
        },
        "weather_api": {
            "configured": state.weather.is_configured(),
            "purpose": "Weather-based agricultural advice",
            "fallback": "Placeholder weather data available when not configured",
        },
    }))
}
