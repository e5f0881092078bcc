use std::io::Cursor;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::KindwiseConfig;

/// Longest image edge sent upstream.
const MAX_EDGE: u32 = 1024;
const JPEG_QUALITY: u8 = 85;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("image could not be processed: {0}")]
    InvalidImage(String),

    #[error("identification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("identification API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("identification response contained no suggestions")]
    NoSuggestions,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    pub disease_name: String,
    pub confidence: f64,
    /// Provider payload, kept opaque.
    pub details: Value,
}

#[async_trait]
pub trait DiseaseIdentifier: Send + Sync {
    /// `image` is the JPEG produced by [`prepare_image`].
    async fn identify(
        &self,
        image: &[u8],
        crop_hint: Option<&str>,
    ) -> Result<Identification, IdentifyError>;

    /// "kindwise" or "mock".
    fn mode(&self) -> &'static str;
}

/// Kindwise crop.health client. Without an API key every call returns a mock
/// prediction; with a key, failures are returned to the caller.
pub struct KindwiseClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl KindwiseClient {
    pub fn new(cfg: &KindwiseConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        if cfg.api_key.is_none() {
            warn!("Kindwise API key not configured; using mock predictions");
        }
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    async fn call(
        &self,
        api_key: &str,
        image: &[u8],
        crop_hint: Option<&str>,
    ) -> Result<Identification, IdentifyError> {
        let mut modifiers = vec!["health_all", "disease_similar_images"];
        if crop_hint.is_some() {
            modifiers.push("crop_specific");
        }
        let payload = json!({
            "images": [B64.encode(image)],
            "modifiers": modifiers,
            "plant_details": ["common_names", "url", "wiki_description", "taxonomy"],
        });

        let response = self
            .client
            .post(format!("{}/identification", self.base_url))
            .header("Api-Key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(IdentifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let identification = parse_identification(body)?;
        info!(
            disease = %identification.disease_name,
            confidence = identification.confidence,
            "kindwise identification"
        );
        Ok(identification)
    }
}

#[async_trait]
impl DiseaseIdentifier for KindwiseClient {
    async fn identify(
        &self,
        image: &[u8],
        crop_hint: Option<&str>,
    ) -> Result<Identification, IdentifyError> {
        match &self.api_key {
            Some(key) => self.call(key, image, crop_hint).await,
            None => Ok(mock_prediction(crop_hint)),
        }
    }

    fn mode(&self) -> &'static str {
        if self.api_key.is_some() {
            "kindwise"
        } else {
            "mock"
        }
    }
}

/// Decodes, converts to RGB, bounds the long edge and re-encodes as JPEG.
pub fn prepare_image(bytes: &[u8]) -> Result<Vec<u8>, IdentifyError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| IdentifyError::InvalidImage(e.to_string()))?;
    let img = if img.width().max(img.height()) > MAX_EDGE {
        img.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| IdentifyError::InvalidImage(e.to_string()))?;
    debug!(width = rgb.width(), height = rgb.height(), "image prepared");
    Ok(out.into_inner())
}

fn parse_identification(body: Value) -> Result<Identification, IdentifyError> {
    let best = body
        .pointer("/result/classification/suggestions/0")
        .cloned()
        .ok_or(IdentifyError::NoSuggestions)?;

    let disease_name = best
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown Disease")
        .to_string();
    let confidence = best
        .get("probability")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let details = json!({
        "disease_name": disease_name,
        "confidence": confidence,
        "similar_images": best.get("similar_images").cloned().unwrap_or_else(|| json!([])),
        "plant_details": body.pointer("/result/plant_details").cloned().unwrap_or_else(|| json!({})),
        "raw_response": body,
    });

    Ok(Identification {
        disease_name,
        confidence,
        details,
    })
}

fn mock_candidates(crop: &str) -> &'static [&'static str] {
    match crop.trim().to_ascii_lowercase().as_str() {
        "tomato" => &[
            "Early_Blight",
            "Late_Blight",
            "Bacterial_Spot",
            "Leaf_Mold",
            "Septoria_Leaf_Spot",
        ],
        "potato" => &["Early_Blight", "Late_Blight"],
        "corn" | "maize" => &["Common_Rust", "Northern_Leaf_Blight", "Gray_Leaf_Spot"],
        "pepper" => &["Bacterial_Spot"],
        "apple" => &["Apple_Scab", "Black_Rot", "Cedar_Apple_Rust"],
        "grape" => &["Black_Rot", "Esca", "Leaf_Blight"],
        _ => &["Leaf_Spot", "Powdery_Mildew", "Rust"],
    }
}

/// Random disease for the crop with a plausible confidence.
pub fn mock_prediction(crop_hint: Option<&str>) -> Identification {
    let crop = crop_hint.unwrap_or_default();
    let mut rng = rand::thread_rng();
    let disease_name = mock_candidates(crop)
        .choose(&mut rng)
        .copied()
        .unwrap_or("Leaf_Spot")
        .to_string();
    let confidence = (rng.gen_range(0.75..=0.95_f64) * 100.0).round() / 100.0;

    Identification {
        details: json!({
            "disease_name": disease_name,
            "confidence": confidence,
            "crop_type": crop,
            "mock": true,
        }),
        disease_name,
        confidence,
    }
}
