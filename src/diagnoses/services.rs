use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{DiagnosisView, ImageUpload, PredictionView, StatsView};
use super::repo_types::{Diagnosis, DiagnosisStats};
use crate::advisories::dto::AdvisoryView;
use crate::db::DbError;
use crate::error::AppError;
use crate::identify::prepare_image;
use crate::state::AppState;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const SUPPORTED_CROPS: &[&str] = &[
    "tomato", "potato", "pepper", "corn", "wheat", "rice", "cotton", "soybean", "apple",
    "grape", "cucumber", "lettuce", "carrot", "onion", "garlic", "strawberry", "blueberry",
    "raspberry", "blackberry", "cabbage", "broccoli", "cauliflower", "spinach", "kale",
];

/// Checks the upload and returns its normalized file extension.
pub fn validate_upload(upload: &ImageUpload, max_bytes: usize) -> Result<String, AppError> {
    if upload.filename.trim().is_empty() {
        return Err(AppError::Validation("No file uploaded".into()));
    }
    if !upload
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(AppError::Validation("File must be an image".into()));
    }
    let ext = upload
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported file type; allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    if upload.bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large; maximum is {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    if upload.crop_type.trim().is_empty() {
        return Err(AppError::Validation("crop_type is required".into()));
    }
    Ok(ext)
}

/// Upload, identify, resolve an advisory, persist best-effort.
#[instrument(skip(state, upload), fields(crop = %upload.crop_type))]
pub async fn record(
    state: &AppState,
    user_id: Uuid,
    upload: ImageUpload,
) -> Result<PredictionView, AppError> {
    let ext = validate_upload(&upload, state.config.storage.max_upload_bytes)?;
    // Undecodable uploads are rejected before anything is stored.
    let raw = upload.bytes.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_image(&raw))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| {
            warn!(error = %e, "upload is not a decodable image");
            AppError::Validation("Invalid image file".into())
        })?;
    let crop_type = upload.crop_type.trim().to_string();
    let key = format!("{}.{ext}", Uuid::new_v4());
    let content_type = upload
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());

    state
        .storage
        .put_object(&key, upload.bytes.clone(), &content_type)
        .await?;

    let identification = match state.identifier.identify(&prepared, Some(&crop_type)).await {
        Ok(id) => id,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&key).await {
                warn!(error = %cleanup, key, "failed to remove image after identification error");
            }
            return Err(e.into());
        }
    };
    let confidence = identification.confidence.clamp(0.0, 1.0);

    let resolved = state
        .resolver
        .resolve(
            &identification.disease_name,
            &crop_type,
            confidence,
            Some(&identification.details),
        )
        .await;

    let image_url = state.storage.object_url(&key).await?;
    let diagnosis = Diagnosis {
        id: Uuid::new_v4(),
        user_id,
        crop_type,
        image_path: key,
        image_url,
        predicted_disease: identification.disease_name,
        confidence_score: confidence,
        advisory: Some(resolved.advisory.clone()),
        api_response: Some(identification.details.clone()),
        created_at: OffsetDateTime::now_utc(),
    };

    let saved = match state.diagnoses.insert(&diagnosis).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, diagnosis_id = %diagnosis.id, "diagnosis not persisted");
            false
        }
    };
    info!(
        diagnosis_id = %diagnosis.id,
        disease = %diagnosis.predicted_disease,
        confidence,
        source = ?resolved.source,
        saved,
        "prediction recorded"
    );

    Ok(PredictionView {
        id: diagnosis.id,
        disease_name: diagnosis.predicted_disease,
        confidence_score: confidence,
        crop_type: diagnosis.crop_type,
        advisory: AdvisoryView {
            advisory: resolved.advisory,
            source: resolved.source,
        },
        api_response: identification.details,
        image_url: diagnosis.image_url,
        saved,
        created_at: diagnosis.created_at,
    })
}

async fn to_view(state: &AppState, d: Diagnosis, with_payload: bool) -> DiagnosisView {
    // Presigned URLs expire, so refresh from the key.
    let image_url = match state.storage.object_url(&d.image_path).await {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, key = %d.image_path, "could not build image url");
            d.image_url
        }
    };
    DiagnosisView {
        id: d.id,
        crop_type: d.crop_type,
        image_url,
        predicted_disease: d.predicted_disease,
        confidence_score: d.confidence_score,
        advisory: d.advisory,
        api_response: if with_payload { d.api_response } else { None },
        created_at: d.created_at,
    }
}

/// Newest first; empty while the store is unreachable.
pub async fn history(
    state: &AppState,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<DiagnosisView>, AppError> {
    let rows = match state.diagnoses.list_for_user(user_id, limit).await {
        Ok(rows) => rows,
        Err(DbError::Unavailable) => {
            warn!("history requested while database unavailable");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let mut views = Vec::with_capacity(rows.len());
    for d in rows {
        views.push(to_view(state, d, false).await);
    }
    Ok(views)
}

pub async fn get(state: &AppState, user_id: Uuid, id: Uuid) -> Result<DiagnosisView, AppError> {
    let d = state
        .diagnoses
        .get(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Diagnosis not found".into()))?;
    Ok(to_view(state, d, true).await)
}

/// Removes the record, then its image. A missing image is not an error.
#[instrument(skip(state))]
pub async fn delete(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let d = state
        .diagnoses
        .delete(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Diagnosis not found".into()))?;
    if let Err(e) = state.storage.delete_object(&d.image_path).await {
        warn!(error = %e, key = %d.image_path, "image removal failed");
    }
    info!(diagnosis_id = %id, "diagnosis deleted");
    Ok(())
}

/// Zeros while the store is unreachable.
pub async fn statistics(state: &AppState, user_id: Uuid) -> Result<StatsView, AppError> {
    match state.diagnoses.statistics(user_id).await {
        Ok(stats) => Ok(stats.into()),
        Err(DbError::Unavailable) => {
            warn!("statistics requested while database unavailable");
            Ok(DiagnosisStats::default().into())
        }
        Err(e) => Err(e.into()),
    }
}
