use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::generation::GenerationError;
use crate::result::{ApiResponse, error_codes};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(serde::Serialize)]
struct RetryInfo {
    reset_time_ms: i64,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问".to_string(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                msg.clone(),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                error_codes::NOT_FOUND,
                "请求不存在".to_string(),
            ),
            AppError::Generation(e) => match e {
                GenerationError::RateLimitExceeded { reset_time_ms } => {
                    return rate_limited(*reset_time_ms);
                }
                GenerationError::IdempotencyConflict => (
                    StatusCode::CONFLICT,
                    error_codes::IDEMPOTENCY_CONFLICT,
                    "幂等键已被其他用户使用".to_string(),
                ),
                GenerationError::PendingDuplicate => (
                    StatusCode::ACCEPTED,
                    error_codes::IN_PROGRESS,
                    "相同请求正在处理中，请稍后查询".to_string(),
                ),
                GenerationError::AlreadyCompleted => (
                    StatusCode::CONFLICT,
                    error_codes::IDEMPOTENCY_CONFLICT,
                    "该请求已完成".to_string(),
                ),
                GenerationError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    error_codes::VALIDATION_ERROR,
                    msg.clone(),
                ),
                GenerationError::Generation(_) => (
                    StatusCode::BAD_GATEWAY,
                    error_codes::GENERATION_FAILED,
                    "训练计划生成失败，请使用相同的幂等键重试".to_string(),
                ),
                GenerationError::Storage(_)
                | GenerationError::Serialization(_)
                | GenerationError::Aborted(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "内部服务器错误".to_string(),
                ),
            },
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(ApiResponse::<()>::error(code, msg))).into_response()
    }
}

/// 429 响应，附带 Retry-After（秒，向上取整）
pub fn rate_limited(reset_time_ms: i64) -> Response {
    let retry_after_secs = (reset_time_ms.max(0) + 999) / 1000;
    let body = Json(ApiResponse::with_data(
        error_codes::RATE_LIMIT,
        format!("请求过于频繁，请在{}秒后重试", retry_after_secs),
        RetryInfo { reset_time_ms },
    ));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
