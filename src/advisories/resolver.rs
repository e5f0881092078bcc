//! Ordered fallback chain that always yields an advisory.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::defaults::{builtin, generic, seed_advisories};
use super::dto::Advisory;
use super::generator::{AdvisoryGenerator, GenerationRequest};
use super::repo::AdvisoryRepo;
use crate::db::DbError;

/// Which stage produced an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorySource {
    Exact,
    DiseaseOnly,
    Generated,
    BuiltIn,
    Generic,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub advisory: Advisory,
    pub source: AdvisorySource,
}

impl Resolved {
    fn new(advisory: Advisory, source: AdvisorySource) -> Self {
        Self { advisory, source }
    }
}

#[derive(Clone)]
pub struct AdvisoryResolver {
    repo: Arc<dyn AdvisoryRepo>,
    generator: Arc<dyn AdvisoryGenerator>,
}

impl AdvisoryResolver {
    pub fn new(repo: Arc<dyn AdvisoryRepo>, generator: Arc<dyn AdvisoryGenerator>) -> Self {
        Self { repo, generator }
    }

    pub fn generator_configured(&self) -> bool {
        self.generator.is_configured()
    }

    #[instrument(skip(self, provider_details))]
    pub async fn resolve(
        &self,
        disease: &str,
        crop: &str,
        confidence: f64,
        provider_details: Option<&Value>,
    ) -> Resolved {
        if let Some(found) = self.stored(disease, crop).await {
            debug!(source = ?found.source, "stored advisory found");
            return found;
        }

        let context = provider_details.and_then(|d| provider_context(d, disease));
        let req = GenerationRequest {
            disease_name: disease,
            crop_type: crop,
            confidence,
            context: context.as_deref(),
        };
        match self.generator.generate(&req).await {
            Ok(raw) => {
                let advisory = raw.into_advisory(disease, crop);
                match self.repo.insert_if_absent(&advisory).await {
                    Ok(true) => info!(disease, crop, "generated advisory stored"),
                    Ok(false) => debug!(disease, crop, "advisory already stored; keeping existing"),
                    Err(e) => warn!(error = %e, disease, crop, "failed to store generated advisory"),
                }
                return Resolved::new(advisory, AdvisorySource::Generated);
            }
            Err(e) => warn!(error = %e, disease, crop, "advisory generation failed"),
        }

        if let Some(adv) = builtin(disease) {
            return Resolved::new(adv, AdvisorySource::BuiltIn);
        }
        Resolved::new(generic(disease, crop), AdvisorySource::Generic)
    }

    /// Stored and built-in advisories only; never calls the generator.
    pub async fn lookup(&self, disease: &str, crop: &str) -> Option<Resolved> {
        if let Some(found) = self.stored(disease, crop).await {
            return Some(found);
        }
        builtin(disease).map(|adv| Resolved::new(adv, AdvisorySource::BuiltIn))
    }

    /// Inserts the shipped crop-specific advisories that are not yet stored.
    pub async fn seed_defaults(&self) -> Result<usize, DbError> {
        let mut inserted = 0;
        for advisory in seed_advisories() {
            if self.repo.insert_if_absent(&advisory).await? {
                inserted += 1;
            }
        }
        info!(inserted, "default advisories seeded");
        Ok(inserted)
    }

    async fn stored(&self, disease: &str, crop: &str) -> Option<Resolved> {
        match self.repo.find_exact(disease, crop).await {
            Ok(Some(adv)) => return Some(Resolved::new(adv, AdvisorySource::Exact)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "exact advisory lookup failed"),
        }
        match self.repo.find_by_disease(disease).await {
            Ok(Some(adv)) => Some(Resolved::new(adv, AdvisorySource::DiseaseOnly)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "advisory lookup by disease failed");
                None
            }
        }
    }
}

/// Description of the provider suggestion whose name matches `disease`.
pub fn provider_context(details: &Value, disease: &str) -> Option<String> {
    const PATHS: [&str; 2] = [
        "/raw_response/result/disease/suggestions",
        "/raw_response/result/classification/suggestions",
    ];
    PATHS
        .iter()
        .filter_map(|p| details.pointer(p).and_then(Value::as_array))
        .flatten()
        .filter(|s| {
            s.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case(disease))
        })
        .find_map(|s| {
            s.pointer("/details/description")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}
