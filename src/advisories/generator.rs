use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dto::{Advisory, Severity, TreatmentStep};
use super::defaults::{DEFAULT_FERTILIZER, DEFAULT_PESTICIDE};
use crate::config::GeminiConfig;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("advisory generation is not configured")]
    NotConfigured,

    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation response contained no text")]
    EmptyResponse,

    #[error("generated advisory is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub struct GenerationRequest<'a> {
    pub disease_name: &'a str,
    pub crop_type: &'a str,
    pub confidence: f64,
    /// Extra description taken from the identification payload.
    pub context: Option<&'a str>,
}

/// Loosely-typed advisory as produced by the model. Every field is optional;
/// [`GeneratedAdvisory::into_advisory`] fills the gaps.
#[derive(Debug, Default, Deserialize)]
pub struct GeneratedAdvisory {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<Value>,
    #[serde(default)]
    pub treatment_steps: Vec<Value>,
    #[serde(default)]
    pub recommended_pesticide: Option<String>,
    #[serde(default)]
    pub recommended_fertilizer: Option<String>,
    #[serde(default)]
    pub prevention_tips: Vec<Value>,
    #[serde(default)]
    pub estimated_recovery_time: Option<String>,
    #[serde(default)]
    pub organic_alternatives: Option<String>,
    #[serde(default)]
    pub when_to_seek_help: Option<String>,
}

impl GeneratedAdvisory {
    /// Keys the result by the requested disease and crop (not whatever the
    /// model echoed back) so a later exact lookup finds it.
    pub fn into_advisory(self, disease: &str, crop: &str) -> Advisory {
        let treatment_steps = self
            .treatment_steps
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                let obj = v.as_object()?;
                Some(TreatmentStep {
                    step: obj
                        .get("step")
                        .and_then(Value::as_u64)
                        .map(|n| n as u32)
                        .unwrap_or(i as u32 + 1),
                    description: obj
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    materials_needed: string_list(
                        obj.get("materials_needed").and_then(Value::as_array).map(Vec::as_slice),
                    ),
                })
            })
            .collect();

        Advisory {
            id: Uuid::new_v4(),
            disease_name: disease.to_string(),
            crop_type: crop.to_string(),
            severity: self
                .severity
                .as_deref()
                .and_then(Severity::parse)
                .unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            symptoms: string_list(Some(self.symptoms.as_slice())),
            treatment_steps,
            recommended_pesticide: self
                .recommended_pesticide
                .or_else(|| Some(DEFAULT_PESTICIDE.to_string())),
            recommended_fertilizer: self
                .recommended_fertilizer
                .or_else(|| Some(DEFAULT_FERTILIZER.to_string())),
            prevention_tips: string_list(Some(self.prevention_tips.as_slice())),
            estimated_recovery_time: self.estimated_recovery_time.unwrap_or_default(),
            organic_alternatives: self.organic_alternatives,
            when_to_seek_help: self.when_to_seek_help,
            created_at: OffsetDateTime::now_utc(),
        }
        .normalized()
    }
}

fn string_list(values: Option<&[Value]>) -> Vec<String> {
    values
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[async_trait]
pub trait AdvisoryGenerator: Send + Sync {
    async fn generate(
        &self,
        req: &GenerationRequest<'_>,
    ) -> Result<GeneratedAdvisory, GenerationError>;

    fn is_configured(&self) -> bool;
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiGenerator {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        if cfg.api_key.is_none() {
            warn!("Gemini API key not configured; using fallback advisories");
        }
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl AdvisoryGenerator for GeminiGenerator {
    async fn generate(
        &self,
        req: &GenerationRequest<'_>,
    ) -> Result<GeneratedAdvisory, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(req) }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or(GenerationError::EmptyResponse)?;
        debug!(chars = text.len(), "gemini response received");

        let advisory = parse_generated(text)?;
        info!(disease = req.disease_name, crop = req.crop_type, "advisory generated");
        Ok(advisory)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Parses model output, tolerating a surrounding markdown code fence.
pub fn parse_generated(text: &str) -> Result<GeneratedAdvisory, GenerationError> {
    let cleaned = strip_fences(text);
    if cleaned.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(serde_json::from_str(cleaned)?)
}

fn strip_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

fn build_prompt(req: &GenerationRequest<'_>) -> String {
    let context = req
        .context
        .map(|c| format!("\nAdditional context: {c}"))
        .unwrap_or_default();
    format!(
        r#"You are an expert agricultural advisor. Generate a disease advisory for farmers.

Disease Detected: {disease}
Crop Type: {crop}
Detection Confidence: {confidence:.1}%{context}

Respond with a single JSON object with these fields:
{{
  "disease_name": "{disease}",
  "crop_type": "{crop}",
  "severity": "mild | moderate | severe",
  "description": "2-3 farmer-friendly sentences",
  "symptoms": ["4-6 visible symptoms"],
  "treatment_steps": [
    {{"step": 1, "description": "what to do", "materials_needed": ["materials"]}}
  ],
  "recommended_pesticide": "product and application",
  "recommended_fertilizer": "fertilizer for recovery",
  "prevention_tips": ["5-7 prevention tips"],
  "estimated_recovery_time": "realistic timeframe",
  "organic_alternatives": "organic options",
  "when_to_seek_help": "when to call an extension officer"
}}

Use simple language, practical and cost-effective advice, and realistic timeframes.
Return ONLY the JSON object."#,
        disease = req.disease_name,
        crop = req.crop_type,
        confidence = req.confidence * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {}  "), "{}");
    }

    #[test]
    fn parse_rejects_prose() {
        assert!(matches!(
            parse_generated("I cannot help with that."),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(parse_generated("```json\n```"), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn missing_fields_are_filled() {
        let raw = parse_generated(r#"{"description": "Fungal leaf disease."}"#).unwrap();
        let adv = raw.into_advisory("Early_Blight", "tomato");
        assert_eq!(adv.severity, Severity::Moderate);
        assert!(!adv.treatment_steps.is_empty());
        assert_eq!(adv.estimated_recovery_time, "2-4 weeks");
        assert_eq!(adv.recommended_pesticide.as_deref(), Some(DEFAULT_PESTICIDE));
        assert_eq!(adv.disease_name, "Early_Blight");
        assert_eq!(adv.crop_type, "tomato");
    }

    #[test]
    fn malformed_steps_are_dropped_and_numbered() {
        let raw = parse_generated(
            r#"{
                "severity": "SEVERE",
                "disease_name": "early blight",
                "treatment_steps": [
                    "not an object",
                    {"description": "Spray copper", "materials_needed": ["copper", 3]},
                    {"step": 7, "description": "Mulch"}
                ]
            }"#,
        )
        .unwrap();
        let adv = raw.into_advisory("Early_Blight", "tomato");
        assert_eq!(adv.severity, Severity::Severe);
        assert_eq!(adv.disease_name, "Early_Blight");
        assert_eq!(adv.treatment_steps.len(), 2);
        assert_eq!(adv.treatment_steps[0].step, 2);
        assert_eq!(adv.treatment_steps[0].materials_needed, vec!["copper".to_string()]);
        assert_eq!(adv.treatment_steps[1].step, 7);
    }

    #[test]
    fn prompt_mentions_inputs() {
        let prompt = build_prompt(&GenerationRequest {
            disease_name: "Late_Blight",
            crop_type: "potato",
            confidence: 0.912,
            context: Some("Caused by Phytophthora infestans"),
        });
        assert!(prompt.contains("Late_Blight"));
        assert!(prompt.contains("potato"));
        assert!(prompt.contains("91.2%"));
        assert!(prompt.contains("Phytophthora"));
    }

    #[tokio::test]
    async fn unconfigured_generator_refuses() {
        let generator = GeminiGenerator::new(&GeminiConfig {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            base_url: "http://127.0.0.1:1".into(),
            timeout: std::time::Duration::from_secs(1),
        })
        .unwrap();
        assert!(!generator.is_configured());
        let err = generator
            .generate(&GenerationRequest {
                disease_name: "Rust",
                crop_type: "wheat",
                confidence: 0.8,
                context: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }
}
