use axum::{
    extract::{Extension, Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    generation::{GenerationParams, LedgerStatus},
    utils::{Claims, success_to_api_response},
};

use super::model::{GenerateWorkoutResponse, GenerationStatusResponse, IDEMPOTENCY_KEY_HEADER};

fn idempotency_key(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation("缺少 Idempotency-Key 请求头".to_string()))
}

#[axum::debug_handler]
pub async fn generate_workout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(req): Json<GenerationParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = idempotency_key(&headers)?;

    let outcome = state.generation.generate(&claims.sub, &key, &req).await?;
    let status = if outcome.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        success_to_api_response(GenerateWorkoutResponse::new(key, outcome)),
    ))
}

#[axum::debug_handler]
pub async fn generation_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let status = state
        .generation
        .status(&claims.sub, &key)
        .await?
        .ok_or(AppError::NotFound)?;

    let code = match status {
        LedgerStatus::Pending => StatusCode::ACCEPTED,
        LedgerStatus::Completed(_) | LedgerStatus::Failed => StatusCode::OK,
    };

    Ok((
        code,
        success_to_api_response(GenerationStatusResponse::new(key, status)),
    ))
}
