use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::database::{RateLimitResult, RateLimitStore};

/// 滑动窗口限流器
///
/// 存储出错时放行（fail open）：该限流只用于控制生成成本，可用性优先于严格限制。
/// 改为拒绝需要有意识地调整，而不是当作缺陷修复。
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub async fn attempt(
        &self,
        identifier: &str,
        action: &str,
        limit: u32,
        window: Duration,
    ) -> RateLimitResult {
        self.attempt_at(identifier, action, limit, window, Utc::now())
            .await
    }

    pub async fn attempt_at(
        &self,
        identifier: &str,
        action: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitResult {
        match self
            .store
            .attempt(identifier, action, limit, window, now)
            .await
        {
            Ok(result) => {
                if !result.admitted {
                    tracing::info!(
                        "Rate limit hit for {} ({}), resets in {} ms",
                        identifier,
                        action,
                        result.reset_time_ms
                    );
                }
                result
            }
            Err(e) => {
                tracing::warn!(
                    "Rate limit storage failed for {}, admitting request: {}",
                    identifier,
                    e
                );
                RateLimitResult::fail_open(limit, window)
            }
        }
    }
}
