use serde_json::Value;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::advisories::dto::Advisory;

/// One recorded prediction.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crop_type: String,
    /// Storage key of the uploaded image.
    pub image_path: String,
    pub image_url: String,
    pub predicted_disease: String,
    pub confidence_score: f64,
    pub advisory: Option<Advisory>,
    pub api_response: Option<Value>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct DiagnosisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub crop_type: String,
    pub image_path: String,
    pub image_url: String,
    pub predicted_disease: String,
    pub confidence_score: f64,
    pub advisory: Option<Json<Advisory>>,
    pub api_response: Option<Json<Value>>,
    pub created_at: OffsetDateTime,
}

impl From<DiagnosisRow> for Diagnosis {
    fn from(r: DiagnosisRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            crop_type: r.crop_type,
            image_path: r.image_path,
            image_url: r.image_url,
            predicted_disease: r.predicted_disease,
            confidence_score: r.confidence_score,
            advisory: r.advisory.map(|j| j.0),
            api_response: r.api_response.map(|j| j.0),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosisStats {
    pub total: i64,
    pub top_diseases: Vec<LabelCount>,
    pub top_crops: Vec<LabelCount>,
}
