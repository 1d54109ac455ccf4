use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::database::models::window_start;
use crate::database::{RateLimitResult, RateLimitStore, StoreError};

/// 基于 Postgres 的滑动窗口限流存储
///
/// 每次尝试在一个事务中执行，并通过按标识哈希的事务级 advisory lock 串行化，
/// 避免并发请求在计数与插入之间同时看到空位。
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn attempt(
        &self,
        identifier: &str,
        action: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, StoreError> {
        let window_start = window_start(now, window);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(identifier)
            .execute(&mut *tx)
            .await?;

        // 清理窗口外的旧记录
        let deleted = sqlx::query(
            r#"
            DELETE FROM rate_limit_records
            WHERE identifier = $1 AND created_at < $2
            "#,
        )
        .bind(identifier)
        .bind(window_start)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if deleted > 0 {
            tracing::debug!("Pruned {} expired rate limit records for {}", deleted, identifier);
        }

        let (count, oldest): (i64, Option<DateTime<Utc>>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), MIN(created_at)
            FROM rate_limit_records
            WHERE identifier = $1 AND created_at >= $2
            "#,
        )
        .bind(identifier)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        let result = RateLimitResult::evaluate(count, oldest, limit, window, now);

        if result.admitted {
            sqlx::query(
                r#"
                INSERT INTO rate_limit_records (identifier, action, created_at)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(identifier)
            .bind(action)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(result)
    }
}
