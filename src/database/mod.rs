// 数据库模块
// 限流记录与幂等请求的存储契约，以及 Postgres / 内存两种实现

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub mod memory;
pub mod models;
pub mod operations;

pub use memory::{MemoryIdempotencyStore, MemoryRateLimitStore};
pub use models::{FindOrCreate, IdempotencyRequest, IdempotencyStatus, RateLimitResult};
pub use operations::{PgIdempotencyStore, PgRateLimitStore};

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt idempotency record `{key}`: {reason}")]
    Corrupt { key: String, reason: String },
}

/// 滑动窗口限流存储
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 在一个原子单元内完成：清理过期记录、计数、判定、放行时插入新记录
    async fn attempt(
        &self,
        identifier: &str,
        action: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, StoreError>;
}

/// 幂等请求存储
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// 原子查找或创建。
    ///
    /// 不存在时插入 pending 记录；同一用户名下 failed 的记录会被重新认领为 pending。
    /// 两者都返回 `Created`，其余情况返回现有记录。
    async fn find_or_create(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FindOrCreate, StoreError>;

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRequest>, StoreError>;

    /// 写入最终结果。仅当记录不存在，或属于该用户且尚未完成时生效，返回是否写入。
    async fn complete(
        &self,
        key: &str,
        user_id: &str,
        result: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// 将该用户的 pending 记录标记为 failed，返回是否更新
    async fn fail(&self, key: &str, user_id: &str) -> Result<bool, StoreError>;
}
