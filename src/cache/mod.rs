// 缓存模块
// 包含缓存键、缓存数据结构和 Redis 操作

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use operations::blueprint::{BlueprintCache, MemoryBlueprintCache, RedisBlueprintCache};
pub use operations::rate_limit::RateLimitCacheOperations;
