use crate::database::StoreError;

use super::generator::GeneratorError;

/// 训练计划生成流程中的错误
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limit exceeded, retry in {reset_time_ms} ms")]
    RateLimitExceeded { reset_time_ms: i64 },

    /// 幂等键已被其他用户使用
    #[error("idempotency key is owned by another user")]
    IdempotencyConflict,

    /// 相同幂等键的请求仍在生成中
    #[error("a request with this idempotency key is still processing")]
    PendingDuplicate,

    #[error("idempotency key already has a stored result")]
    AlreadyCompleted,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to (de)serialize stored result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("workout generation failed: {0}")]
    Generation(#[from] GeneratorError),

    /// 生成任务异常退出
    #[error("generation task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}
