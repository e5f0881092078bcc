use crate::state::AppState;
use axum::Router;

pub mod defaults;
pub mod dto;
pub mod generator;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod resolver;

pub fn router() -> Router<AppState> {
    handlers::advisory_routes()
}
