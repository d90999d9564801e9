pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod file_service;
pub mod gemini;
pub mod models;
pub mod ocr;
pub mod response_parser;
pub mod routes;
pub mod session;
pub mod swagger;
pub mod translation;

#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use config::Config;
use db::Database;
use gemini::GeminiClient;
use session::SessionStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use translation::Translator;

/// Request body cap, sized for large scanned reports.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub gemini: GeminiClient,
    pub translator: Translator,
    pub sessions: SessionStore,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .merge(routes::documents::router())
        .nest("/api/auth", routes::auth::router())
        .nest("/api/user", routes::users::router())
        .route("/api/chat", post(routes::chat::chat))
        .merge(swagger::create_swagger_router())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring
pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({"status": "ok"})))
}
