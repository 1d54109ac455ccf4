use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::{
    AppState,
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub database: &'static str,
}

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(HealthResponse { database: "ok" }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库不可用".to_string()),
            )
        }
    }
}
