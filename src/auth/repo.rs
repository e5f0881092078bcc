use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::db::{Database, DbError};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DbError>;
    /// Fails with `DbError::Conflict` when the email or phone number is taken.
    async fn create(&self, user: NewUser) -> Result<User, DbError>;
}

pub struct PgUserRepo {
    db: Arc<Database>,
}

impl PgUserRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let pool = self.db.pool().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone_number, region, password_hash, is_active,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let pool = self.db.pool().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone_number, region, password_hash, is_active,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, DbError> {
        let pool = self.db.pool().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, phone_number, region, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, phone_number, region, password_hash, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(&new.region)
        .bind(&new.password_hash)
        .fetch_one(&pool)
        .await?;
        Ok(user)
    }
}
