use axum::http::Uri;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// Routes served directly by this process. Content pages live behind it.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Not found: {}", uri.path()))
}
