use std::sync::Arc;

use redis::Client as RedisClient;

use crate::cache::keys::rate_limit_key;

/// 请求限流计数缓存操作（固定窗口）
pub struct RateLimitCacheOperations;

impl RateLimitCacheOperations {
    /// 增加客户端在当前窗口内的计数，返回增加后的值
    pub async fn increment(
        redis: &Arc<RedisClient>,
        client: &str,
        window_secs: u64,
    ) -> Result<u64, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let key = rate_limit_key(client);

        // SET NX EX 与 INCR 在同一个事务中执行，首次计数时计数器必定带有过期时间
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(window_secs.max(1))
            .arg("NX")
            .ignore()
            .incr(&key, 1)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }
}
