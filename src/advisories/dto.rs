use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::resolver::AdvisorySource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

impl Severity {
    /// Case-insensitive; unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mild" => Some(Severity::Mild),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentStep {
    pub step: u32,
    pub description: String,
    #[serde(default)]
    pub materials_needed: Vec<String>,
}

impl TreatmentStep {
    pub fn new(step: u32, description: &str, materials: &[&str]) -> Self {
        Self {
            step,
            description: description.to_string(),
            materials_needed: materials.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// One advisory shape for stored, generated and fallback advisories alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: Uuid,
    pub disease_name: String,
    pub crop_type: String,
    pub severity: Severity,
    pub description: String,
    pub symptoms: Vec<String>,
    pub treatment_steps: Vec<TreatmentStep>,
    pub recommended_pesticide: Option<String>,
    pub recommended_fertilizer: Option<String>,
    pub prevention_tips: Vec<String>,
    pub estimated_recovery_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic_alternatives: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_seek_help: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct AdvisoryQuery {
    #[serde(default = "default_crop")]
    pub crop_type: String,
}
fn default_crop() -> String {
    "General".to_string()
}

#[derive(Debug, Serialize)]
pub struct AdvisoryView {
    #[serde(flatten)]
    pub advisory: Advisory,
    pub source: AdvisorySource,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub region: Option<String>,
}
