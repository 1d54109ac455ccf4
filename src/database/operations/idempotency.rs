use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::database::models::idempotency::IdempotencyRow;
use crate::database::{FindOrCreate, IdempotencyRequest, IdempotencyStore, StoreError};

/// 基于 Postgres 的幂等请求存储
#[derive(Clone)]
pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_request(row: IdempotencyRow) -> Result<IdempotencyRequest, StoreError> {
    let key = row.idempotency_key.clone();
    IdempotencyRequest::try_from(row).map_err(|status| StoreError::Corrupt {
        key,
        reason: format!("unknown status `{}`", status),
    })
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn find_or_create(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FindOrCreate, StoreError> {
        // 唯一约束保证同一个 key 只有一个请求能插入成功；
        // 冲突时仅当记录属于同一用户且已失败才重新认领
        let created = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            INSERT INTO idempotency_requests (idempotency_key, user_id, status, created_at)
            VALUES ($1, $2, 'pending', $3)
            ON CONFLICT (idempotency_key) DO UPDATE
                SET status = 'pending',
                    result = NULL,
                    created_at = EXCLUDED.created_at,
                    completed_at = NULL
                WHERE idempotency_requests.status = 'failed'
                  AND idempotency_requests.user_id = EXCLUDED.user_id
            RETURNING idempotency_key, user_id, status, result, created_at, completed_at
            "#,
        )
        .bind(key)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = created {
            return Ok(FindOrCreate::Created(into_request(row)?));
        }

        match self.find(key).await? {
            Some(existing) => Ok(FindOrCreate::Existing(existing)),
            None => Err(StoreError::Unavailable(format!(
                "idempotency record `{}` vanished during lookup",
                key
            ))),
        }
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRequest>, StoreError> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            SELECT idempotency_key, user_id, status, result, created_at, completed_at
            FROM idempotency_requests
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_request).transpose()
    }

    async fn complete(
        &self,
        key: &str,
        user_id: &str,
        result: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let written = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO idempotency_requests
                (idempotency_key, user_id, status, result, created_at, completed_at)
            VALUES ($1, $2, 'completed', $3, $4, $4)
            ON CONFLICT (idempotency_key) DO UPDATE
                SET status = 'completed',
                    result = EXCLUDED.result,
                    completed_at = EXCLUDED.completed_at
                WHERE idempotency_requests.status <> 'completed'
                  AND idempotency_requests.user_id = EXCLUDED.user_id
            RETURNING idempotency_key
            "#,
        )
        .bind(key)
        .bind(user_id)
        .bind(result)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(written.is_some())
    }

    async fn fail(&self, key: &str, user_id: &str) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE idempotency_requests
            SET status = 'failed'
            WHERE idempotency_key = $1 AND user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(key)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }
}
