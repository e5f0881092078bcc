use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::repo_types::{Diagnosis, DiagnosisRow, DiagnosisStats, LabelCount};
use crate::db::{Database, DbError};

/// Entries reported per statistics breakdown.
pub const TOP_N: i64 = 5;

#[async_trait]
pub trait DiagnosisRepo: Send + Sync {
    async fn insert(&self, diagnosis: &Diagnosis) -> Result<(), DbError>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Diagnosis>, DbError>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>, DbError>;
    /// Returns the removed record so its image can be cleaned up.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>, DbError>;
    async fn statistics(&self, user_id: Uuid) -> Result<DiagnosisStats, DbError>;
}

const COLUMNS: &str = "id, user_id, crop_type, image_path, image_url, predicted_disease, \
                       confidence_score, advisory, api_response, created_at";

pub struct PgDiagnosisRepo {
    db: Arc<Database>,
}

impl PgDiagnosisRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DiagnosisRepo for PgDiagnosisRepo {
    async fn insert(&self, d: &Diagnosis) -> Result<(), DbError> {
        let pool = self.db.pool().await?;
        sqlx::query(&format!(
            "INSERT INTO diagnoses ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(d.id)
        .bind(d.user_id)
        .bind(&d.crop_type)
        .bind(&d.image_path)
        .bind(&d.image_url)
        .bind(&d.predicted_disease)
        .bind(d.confidence_score)
        .bind(d.advisory.as_ref().map(Json))
        .bind(d.api_response.as_ref().map(Json))
        .bind(d.created_at)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Diagnosis>, DbError> {
        let pool = self.db.pool().await?;
        let rows = sqlx::query_as::<_, DiagnosisRow>(&format!(
            "SELECT {COLUMNS} FROM diagnoses WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&pool)
        .await?;
        Ok(rows.into_iter().map(Diagnosis::from).collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>, DbError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query_as::<_, DiagnosisRow>(&format!(
            "SELECT {COLUMNS} FROM diagnoses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Diagnosis::from))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diagnosis>, DbError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query_as::<_, DiagnosisRow>(&format!(
            "DELETE FROM diagnoses WHERE id = $1 AND user_id = $2 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Diagnosis::from))
    }

    async fn statistics(&self, user_id: Uuid) -> Result<DiagnosisStats, DbError> {
        let pool = self.db.pool().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diagnoses WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

        let top_diseases = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT predicted_disease AS label, COUNT(*) AS count
            FROM diagnoses WHERE user_id = $1
            GROUP BY predicted_disease
            ORDER BY count DESC, label ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(TOP_N)
        .fetch_all(&pool)
        .await?;

        let top_crops = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT crop_type AS label, COUNT(*) AS count
            FROM diagnoses WHERE user_id = $1
            GROUP BY crop_type
            ORDER BY count DESC, label ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(TOP_N)
        .fetch_all(&pool)
        .await?;

        Ok(DiagnosisStats {
            total,
            top_diseases,
            top_crops,
        })
    }
}
