use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{
    DeletedView, DiagnosisView, HistoryQuery, ImageUpload, PredictionView, StatsView,
    SupportedCrops,
};
use super::services::{self, SUPPORTED_CROPS};
use crate::{auth::AuthUser, error::AppError, state::AppState};

/// Multipart overhead allowed on top of the image size limit.
const FORM_OVERHEAD: usize = 1024 * 1024;

pub fn disease_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/disease/predict",
            post(predict).layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD)),
        )
        .route("/disease/history", get(disease_history))
        .route(
            "/disease/diagnosis/:id",
            get(get_diagnosis).delete(delete_diagnosis),
        )
        .route("/disease/supported-crops", get(supported_crops))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/history", get(dashboard_history))
        .route("/dashboard/statistics", get(dashboard_statistics))
}

async fn read_form(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let mut file = None;
    let mut crop_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                file = Some((filename, content_type, bytes));
            }
            Some("crop_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read crop_type: {e}")))?;
                crop_type = Some(text);
            }
            other => warn!(field = ?other, "ignoring unexpected form field"),
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("No file uploaded".into()))?;
    Ok(ImageUpload {
        filename,
        content_type,
        bytes,
        crop_type: crop_type.ok_or_else(|| AppError::Validation("crop_type is required".into()))?,
    })
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<Json<PredictionView>, AppError> {
    let upload = read_form(multipart).await?;
    Ok(Json(services::record(&state, user_id, upload).await?))
}

fn bounded_limit(raw: Option<i64>, default: i64, max: i64) -> Result<i64, AppError> {
    let limit = raw.unwrap_or(default);
    if !(1..=max).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {max}"
        )));
    }
    Ok(limit)
}

#[instrument(skip(state))]
pub async fn disease_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<DiagnosisView>>, AppError> {
    let limit = bounded_limit(q.limit, 10, 50)?;
    Ok(Json(services::history(&state, user_id, limit).await?))
}

#[instrument(skip(state))]
pub async fn dashboard_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<DiagnosisView>>, AppError> {
    let limit = bounded_limit(q.limit, 50, 100)?;
    Ok(Json(services::history(&state, user_id, limit).await?))
}

#[instrument(skip(state))]
pub async fn get_diagnosis(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DiagnosisView>, AppError> {
    Ok(Json(services::get(&state, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn delete_diagnosis(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedView>, AppError> {
    services::delete(&state, user_id, id).await?;
    Ok(Json(DeletedView {
        message: "Diagnosis deleted successfully",
        id,
    }))
}

#[instrument(skip(state))]
pub async fn dashboard_statistics(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<StatsView>, AppError> {
    Ok(Json(services::statistics(&state, user_id).await?))
}

pub async fn supported_crops() -> Json<SupportedCrops> {
    Json(SupportedCrops {
        crops: SUPPORTED_CROPS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, Fakes};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "cropdocboundary";

    fn multipart_body(crop: &str, image: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"crop_type\"\r\n\r\n{crop}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"leaf.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn app(fakes: &Fakes) -> Router {
        Router::new()
            .merge(disease_routes(5 * 1024 * 1024))
            .merge(dashboard_routes())
            .with_state(fakes.state.clone())
    }

    #[test]
    fn limits_are_bounded() {
        assert_eq!(bounded_limit(None, 10, 50).unwrap(), 10);
        assert_eq!(bounded_limit(Some(50), 10, 50).unwrap(), 50);
        assert!(bounded_limit(Some(0), 10, 50).is_err());
        assert!(bounded_limit(Some(51), 10, 50).is_err());
    }

    #[tokio::test]
    async fn predict_then_list() {
        let fakes = Fakes::new();
        let token = fakes.token_for(Uuid::new_v4());
        let app = app(&fakes);

        let res = app
            .clone()
            .oneshot(
                Request::post("/disease/predict")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body("tomato", &png_bytes())))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(
                Request::get("/dashboard/statistics")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stats["total_diagnoses"], 1);
    }

    #[tokio::test]
    async fn history_requires_auth_and_valid_limit() {
        let fakes = Fakes::new();
        let app = app(&fakes);
        let res = app
            .clone()
            .oneshot(Request::get("/disease/history").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let token = fakes.token_for(Uuid::new_v4());
        let res = app
            .oneshot(
                Request::get("/disease/history?limit=500")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
