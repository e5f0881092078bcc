use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::WeatherConfig;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("weather API returned {0}")]
    Api(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReading {
    pub temperature: f64,
    pub humidity: f64,
    pub weather_condition: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherAdvice {
    pub temperature: f64,
    pub humidity: f64,
    pub weather_condition: String,
    pub planting_advice: String,
    pub irrigation_advice: String,
    pub pest_risk: String,
}

// Subset of the OpenWeatherMap current-weather payload.
#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
}

pub struct WeatherClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(cfg: &WeatherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Current conditions for `region`. Without an API key a fixed placeholder
    /// reading is returned; provider failures yield `None`.
    pub async fn current(&self, region: &str) -> Option<WeatherReading> {
        let Some(key) = self.api_key.as_deref() else {
            return Some(placeholder(region));
        };
        match self.fetch(key, region).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!(error = %e, region, "weather lookup failed");
                None
            }
        }
    }

    async fn fetch(&self, key: &str, region: &str) -> Result<WeatherReading, WeatherError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", region), ("appid", key), ("units", "metric")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WeatherError::Api(response.status().as_u16()));
        }
        let body: OwmResponse = response.json().await?;
        debug!(region, temp = body.main.temp, "weather fetched");
        Ok(WeatherReading {
            temperature: body.main.temp,
            humidity: body.main.humidity,
            weather_condition: body
                .weather
                .into_iter()
                .next()
                .map(|w| w.main.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string()),
            region: region.to_string(),
        })
    }
}

fn placeholder(region: &str) -> WeatherReading {
    WeatherReading {
        temperature: 25.5,
        humidity: 65.0,
        weather_condition: "partly_cloudy".to_string(),
        region: region.to_string(),
    }
}

/// Rule-based tips: temperature drives planting and irrigation, humidity
/// drives pest risk.
pub fn advise(reading: &WeatherReading) -> WeatherAdvice {
    let t = reading.temperature;
    let h = reading.humidity;

    let (planting_advice, irrigation_advice) = if t > 30.0 {
        (
            "High temperature detected. Consider planting heat-resistant varieties.",
            "Increase watering frequency due to high temperature.",
        )
    } else if t < 15.0 {
        (
            "Low temperature. Consider using greenhouse or wait for warmer weather.",
            "Reduce watering as evaporation is low in cool weather.",
        )
    } else {
        (
            "Good temperature for most crops. Proceed with normal planting.",
            "Maintain regular watering schedule.",
        )
    };

    let pest_risk = if h > 80.0 {
        "High humidity increases fungal disease risk. Monitor crops closely."
    } else if h < 40.0 {
        "Low humidity may stress plants. Ensure adequate irrigation."
    } else {
        "Humidity levels are good for crop growth."
    };

    WeatherAdvice {
        temperature: t,
        humidity: h,
        weather_condition: reading.weather_condition.clone(),
        planting_advice: planting_advice.to_string(),
        irrigation_advice: irrigation_advice.to_string(),
        pest_risk: pest_risk.to_string(),
    }
}
