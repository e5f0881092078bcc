use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{db::DbError, identify::IdentifyError, state::AppState};

/// Generic wording carried on responses whose detail may leak internals.
#[derive(Debug, Clone, Copy)]
struct PublicDetail {
    category: &'static str,
    detail: &'static str,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("upstream provider failed: {0}")]
    Upstream(String),

    #[error("service temporarily unavailable")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Upstream(_) => "upstream",
            AppError::Unavailable => "unavailable",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Unavailable | DbError::Connect(_) => AppError::Unavailable,
            DbError::NotFound => AppError::NotFound("Record not found".into()),
            DbError::Conflict(_) => AppError::Conflict("Duplicate record".into()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<IdentifyError> for AppError {
    fn from(e: IdentifyError) -> Self {
        match e {
            IdentifyError::InvalidImage(msg) => AppError::Validation(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let category = self.category();
        let public = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                Some("Internal server error")
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "upstream provider error");
                Some("Disease identification service failed")
            }
            _ => None,
        };

        let body = Json(json!({ "error": category, "detail": self.to_string() }));
        let mut res = if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        };
        if let Some(detail) = public {
            res.extensions_mut().insert(PublicDetail { category, detail });
        }
        res
    }
}

/// Replaces internal and upstream error details with generic wording in
/// production.
pub async fn redact_details(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    if !state.config.is_production() {
        return res;
    }
    match res.extensions().get::<PublicDetail>().copied() {
        Some(PublicDetail { category, detail }) => {
            (res.status(), Json(json!({ "error": category, "detail": detail }))).into_response()
        }
        None => res,
    }
}
