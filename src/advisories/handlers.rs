use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AdvisoryQuery, AdvisoryView, WeatherQuery};
use crate::{
    auth::{services::current_user, AuthUser},
    error::AppError,
    state::AppState,
    weather::{advise, WeatherAdvice},
};

pub fn advisory_routes() -> Router<AppState> {
    Router::new()
        .route("/advisory/disease/:name", get(disease_info))
        .route("/advisory/weather", get(weather_advice))
}

#[instrument(skip(state, _user))]
pub async fn disease_info(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(name): Path<String>,
    Query(q): Query<AdvisoryQuery>,
) -> Result<Json<AdvisoryView>, AppError> {
    let resolved = state
        .resolver
        .lookup(&name, &q.crop_type)
        .await
        .ok_or_else(|| {
            AppError::NotFound("Advisory not found for this disease and crop combination".into())
        })?;
    Ok(Json(AdvisoryView {
        advisory: resolved.advisory,
        source: resolved.source,
    }))
}

/// `null` when the weather provider is unreachable.
#[instrument(skip(state))]
pub async fn weather_advice(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<WeatherQuery>,
) -> Result<Json<Option<WeatherAdvice>>, AppError> {
    let region = match q.region.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
        Some(r) => r,
        None => current_user(state.users.as_ref(), user_id).await?.region,
    };
    let advice = state.weather.current(&region).await.map(|r| advise(&r));
    info!(region = %region, available = advice.is_some(), "weather advice");
    Ok(Json(advice))
}
