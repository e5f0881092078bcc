use std::sync::Arc;

use crate::advisories::{
    generator::{AdvisoryGenerator, GeminiGenerator},
    repo::PgAdvisoryRepo,
    resolver::AdvisoryResolver,
};
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db::Database;
use crate::diagnoses::repo::{DiagnosisRepo, PgDiagnosisRepo};
use crate::identify::{DiseaseIdentifier, KindwiseClient};
use crate::storage::{build_storage, StorageClient};
use crate::weather::WeatherClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub users: Arc<dyn UserRepo>,
    pub diagnoses: Arc<dyn DiagnosisRepo>,
    pub resolver: AdvisoryResolver,
    pub identifier: Arc<dyn DiseaseIdentifier>,
    pub weather: Arc<WeatherClient>,
}

impl AppState {
    /// Wires the production clients. Does not connect to the database.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let db = Arc::new(Database::new(config.db.clone()));
        let storage = build_storage(&config.storage).await?;

        let generator: Arc<dyn AdvisoryGenerator> = Arc::new(GeminiGenerator::new(&config.gemini)?);
        let resolver = AdvisoryResolver::new(Arc::new(PgAdvisoryRepo::new(db.clone())), generator);

        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            diagnoses: Arc::new(PgDiagnosisRepo::new(db.clone())),
            identifier: Arc::new(KindwiseClient::new(&config.kindwise)?),
            weather: Arc::new(WeatherClient::new(&config.weather)?),
            resolver,
            storage,
            config,
            db,
        })
    }
}
