// 数据库实体定义

pub mod idempotency;
pub mod rate_limit;

pub use idempotency::{FindOrCreate, IdempotencyRequest, IdempotencyStatus};
pub use rate_limit::{RateLimitRecord, RateLimitResult, window_start};
