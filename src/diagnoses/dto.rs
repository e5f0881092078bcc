use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DiagnosisStats, LabelCount};
use crate::advisories::dto::{Advisory, AdvisoryView};

/// An image received from the predict form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub crop_type: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionView {
    pub id: Uuid,
    pub disease_name: String,
    pub confidence_score: f64,
    pub crop_type: String,
    pub advisory: AdvisoryView,
    pub api_response: Value,
    pub image_url: String,
    /// False when the diagnosis could not be persisted.
    pub saved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct DiagnosisView {
    pub id: Uuid,
    pub crop_type: String,
    pub image_url: String,
    pub predicted_disease: String,
    pub confidence_score: f64,
    pub advisory: Option<Advisory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_response: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct DiseaseCount {
    pub disease: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct CropCount {
    pub crop: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub total_diagnoses: i64,
    pub most_common_diseases: Vec<DiseaseCount>,
    pub most_common_crops: Vec<CropCount>,
}

impl From<DiagnosisStats> for StatsView {
    fn from(s: DiagnosisStats) -> Self {
        Self {
            total_diagnoses: s.total,
            most_common_diseases: s
                .top_diseases
                .into_iter()
                .map(|LabelCount { label, count }| DiseaseCount { disease: label, count })
                .collect(),
            most_common_crops: s
                .top_crops
                .into_iter()
                .map(|LabelCount { label, count }| CropCount { crop: label, count })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeletedView {
    pub message: &'static str,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SupportedCrops {
    pub crops: &'static [&'static str],
}
