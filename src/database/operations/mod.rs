/// Postgres 存储实现
pub mod idempotency;
pub mod rate_limit;

pub use idempotency::PgIdempotencyStore;
pub use rate_limit::PgRateLimitStore;
