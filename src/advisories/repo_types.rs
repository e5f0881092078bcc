use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{Advisory, Severity, TreatmentStep};

/// Advisory row; list fields are jsonb.
#[derive(Debug, FromRow)]
pub struct AdvisoryRow {
    pub id: Uuid,
    pub disease_name: String,
    pub crop_type: String,
    pub severity: String,
    pub description: String,
    pub symptoms: Json<Vec<String>>,
    pub treatment_steps: Json<Vec<TreatmentStep>>,
    pub recommended_pesticide: Option<String>,
    pub recommended_fertilizer: Option<String>,
    pub prevention_tips: Json<Vec<String>>,
    pub estimated_recovery_time: String,
    pub organic_alternatives: Option<String>,
    pub when_to_seek_help: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<AdvisoryRow> for Advisory {
    fn from(r: AdvisoryRow) -> Self {
        Self {
            id: r.id,
            disease_name: r.disease_name,
            crop_type: r.crop_type,
            severity: Severity::parse(&r.severity).unwrap_or_default(),
            description: r.description,
            symptoms: r.symptoms.0,
            treatment_steps: r.treatment_steps.0,
            recommended_pesticide: r.recommended_pesticide,
            recommended_fertilizer: r.recommended_fertilizer,
            prevention_tips: r.prevention_tips.0,
            estimated_recovery_time: r.estimated_recovery_time,
            organic_alternatives: r.organic_alternatives,
            when_to_seek_help: r.when_to_seek_help,
            created_at: r.created_at,
        }
    }
}
