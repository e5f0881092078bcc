use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;

use super::dto::Advisory;
use super::repo_types::AdvisoryRow;
use crate::db::{Database, DbError};

#[async_trait]
pub trait AdvisoryRepo: Send + Sync {
    /// Case-insensitive match on disease and crop.
    async fn find_exact(&self, disease: &str, crop: &str) -> Result<Option<Advisory>, DbError>;

    /// Case-insensitive match on disease alone; oldest record wins.
    async fn find_by_disease(&self, disease: &str) -> Result<Option<Advisory>, DbError>;

    /// Returns `false` when the (disease, crop) pair is already stored.
    async fn insert_if_absent(&self, advisory: &Advisory) -> Result<bool, DbError>;
}

const SELECT_ADVISORY: &str = r#"
    SELECT id, disease_name, crop_type, severity, description, symptoms, treatment_steps,
           recommended_pesticide, recommended_fertilizer, prevention_tips,
           estimated_recovery_time, organic_alternatives, when_to_seek_help, created_at
      FROM advisories
"#;

pub struct PgAdvisoryRepo {
    db: Arc<Database>,
}

impl PgAdvisoryRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdvisoryRepo for PgAdvisoryRepo {
    async fn find_exact(&self, disease: &str, crop: &str) -> Result<Option<Advisory>, DbError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query_as::<_, AdvisoryRow>(&format!(
            "{SELECT_ADVISORY} WHERE lower(disease_name) = lower($1) AND lower(crop_type) = lower($2) LIMIT 1"
        ))
        .bind(disease.trim())
        .bind(crop.trim())
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Advisory::from))
    }

    async fn find_by_disease(&self, disease: &str) -> Result<Option<Advisory>, DbError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query_as::<_, AdvisoryRow>(&format!(
            "{SELECT_ADVISORY} WHERE lower(disease_name) = lower($1) ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(disease.trim())
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Advisory::from))
    }

    async fn insert_if_absent(&self, a: &Advisory) -> Result<bool, DbError> {
        let pool = self.db.pool().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO advisories (
                id, disease_name, crop_type, severity, description, symptoms, treatment_steps,
                recommended_pesticide, recommended_fertilizer, prevention_tips,
                estimated_recovery_time, organic_alternatives, when_to_seek_help, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(a.id)
        .bind(&a.disease_name)
        .bind(&a.crop_type)
        .bind(a.severity.as_str())
        .bind(&a.description)
        .bind(Json(&a.symptoms))
        .bind(Json(&a.treatment_steps))
        .bind(&a.recommended_pesticide)
        .bind(&a.recommended_fertilizer)
        .bind(Json(&a.prevention_tips))
        .bind(&a.estimated_recovery_time)
        .bind(&a.organic_alternatives)
        .bind(&a.when_to_seek_help)
        .bind(a.created_at)
        .execute(&pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
