// 限流记录实体
// 每次放行的请求对应一行记录，超出窗口后惰性删除

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 限流记录，对应 rate_limit_records 表
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateLimitRecord {
    /// 限流标识，例如 "ai_workout:<user_id>"
    pub identifier: String,
    /// 动作标签
    pub action: String,
    /// 记录创建时间
    pub created_at: DateTime<Utc>,
}

/// 一次限流判定的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub admitted: bool,
    pub remaining: u32,
    /// 距离窗口内最早一条记录过期的毫秒数
    pub reset_time_ms: i64,
}

/// 窗口起点。负窗口按 0 处理，溢出时取最早可表示时间
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window.max(Duration::zero()))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl RateLimitResult {
    /// 根据窗口内的计数和最早记录时间做出判定。
    ///
    /// 调用方必须在同一个原子单元内完成计数、判定与插入。
    pub fn evaluate(
        count: i64,
        oldest: Option<DateTime<Utc>>,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let reset_time_ms = oldest
            .and_then(|oldest| oldest.checked_add_signed(window))
            .map(|expires| (expires - now).num_milliseconds().max(0))
            .unwrap_or_else(|| window.num_milliseconds().max(0));

        if count >= i64::from(limit) {
            return Self {
                admitted: false,
                remaining: 0,
                reset_time_ms,
            };
        }

        Self {
            admitted: true,
            remaining: (i64::from(limit) - count - 1) as u32,
            reset_time_ms,
        }
    }

    /// 存储不可用时的放行结果
    pub fn fail_open(limit: u32, window: Duration) -> Self {
        Self {
            admitted: true,
            remaining: limit.saturating_sub(1),
            reset_time_ms: window.num_milliseconds().max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_never_overflows() {
        let now = Utc::now();
        assert_eq!(window_start(now, Duration::seconds(10)), now - Duration::seconds(10));
        assert_eq!(window_start(now, Duration::milliseconds(-60_000)), now);
        assert_eq!(
            window_start(now, Duration::milliseconds(i64::MAX)),
            DateTime::<Utc>::MIN_UTC
        );
    }

    #[test]
    fn admits_while_below_limit() {
        let now = Utc::now();
        let result = RateLimitResult::evaluate(2, Some(now), 5, Duration::seconds(60), now);
        assert!(result.admitted);
        assert_eq!(result.remaining, 2);
        assert_eq!(result.reset_time_ms, 60_000);
    }

    #[test]
    fn rejects_at_limit_with_time_until_oldest_expires() {
        let now = Utc::now();
        let oldest = now - Duration::seconds(45);
        let result = RateLimitResult::evaluate(5, Some(oldest), 5, Duration::seconds(60), now);
        assert!(!result.admitted);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.reset_time_ms, 15_000);
    }

    #[test]
    fn reset_time_never_negative() {
        let now = Utc::now();
        let oldest = now - Duration::seconds(90);
        let result = RateLimitResult::evaluate(3, Some(oldest), 3, Duration::seconds(60), now);
        assert_eq!(result.reset_time_ms, 0);
    }

    #[test]
    fn zero_limit_always_rejects() {
        let now = Utc::now();
        let result = RateLimitResult::evaluate(0, None, 0, Duration::seconds(10), now);
        assert!(!result.admitted);
        assert_eq!(result.reset_time_ms, 10_000);
    }

    #[test]
    fn fail_open_reports_one_slot_used() {
        let result = RateLimitResult::fail_open(5, Duration::seconds(60));
        assert!(result.admitted);
        assert_eq!(result.remaining, 4);
    }
}
