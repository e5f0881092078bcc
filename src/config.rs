use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub upload_dir: PathBuf,
    pub public_prefix: String,
    pub max_upload_bytes: usize,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KindwiseConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    /// Abort boot when the database cannot be reached.
    pub strict_startup: bool,
    pub allowed_origins: Vec<String>,
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub kindwise: KindwiseConfig,
    pub gemini: GeminiConfig,
    pub weather: WeatherConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::parse(&env_or("APP_ENV", "development"));
        let production = environment == Environment::Production;

        let db = DbConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            min_connections: env_parse("DB_MIN_CONNECTIONS", 1),
            connect_timeout: Duration::from_secs(env_parse("DB_CONNECT_TIMEOUT_SECS", 5)),
            statement_timeout: Duration::from_secs(env_parse("DB_STATEMENT_TIMEOUT_SECS", 5)),
            max_retries: env_parse("DB_MAX_RETRIES", 3),
            retry_base_delay: Duration::from_secs(env_parse("DB_RETRY_BASE_SECS", 2)),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env_or("JWT_ISSUER", "cropdoc"),
            audience: env_or("JWT_AUDIENCE", "cropdoc-farmers"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 30),
        };

        let backend = match env_or("STORAGE_BACKEND", "local").to_ascii_lowercase().as_str() {
            "s3" | "minio" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };
        let s3 = match backend {
            StorageBackend::S3 => Some(S3Config {
                endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT must be set")?,
                bucket: std::env::var("S3_BUCKET").context("S3_BUCKET must be set")?,
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY must be set")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY must be set")?,
                region: env_or("S3_REGION", "us-east-1"),
                presign_ttl_secs: env_parse("S3_PRESIGN_TTL_SECS", 30 * 60),
            }),
            StorageBackend::Local => None,
        };
        let storage = StorageConfig {
            backend,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads/images")),
            public_prefix: env_or("UPLOAD_PUBLIC_PREFIX", "/uploads/images"),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            s3,
        };

        let kindwise = KindwiseConfig {
            api_key: optional_key("KINDWISE_API_KEY"),
            base_url: env_or("KINDWISE_API_URL", "https://api.kindwise.com/v1"),
            timeout: Duration::from_secs(env_parse("KINDWISE_TIMEOUT_SECS", 30)),
        };
        let gemini = GeminiConfig {
            api_key: optional_key("GEMINI_API_KEY"),
            model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
            base_url: env_or(
                "GEMINI_API_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            timeout: Duration::from_secs(env_parse("GEMINI_TIMEOUT_SECS", 30)),
        };
        let weather = WeatherConfig {
            api_key: optional_key("WEATHER_API_KEY"),
            url: env_or(
                "WEATHER_API_URL",
                "http://api.openweathermap.org/data/2.5/weather",
            ),
            timeout: Duration::from_secs(env_parse("WEATHER_TIMEOUT_SECS", 5)),
        };

        let allowed_origins = env_or("ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            environment,
            strict_startup: env_parse("STRICT_STARTUP", production),
            allowed_origins,
            db,
            jwt,
            storage,
            kindwise,
            gemini,
            weather,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Provider keys left empty or at the `.env.example` placeholder count as unset.
fn optional_key(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| normalize_key(&v))
}

fn normalize_key(raw: &str) -> Option<String> {
    let v = raw.trim();
    if v.is_empty() || (v.starts_with("your-") && v.ends_with("-here")) {
        None
    } else {
        Some(v.to_string())
    }
}
