use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::database::{
    FindOrCreate, IdempotencyRequest, IdempotencyStatus, IdempotencyStore, StoreError,
};

use super::GenerationError;

/// 幂等查询结果
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    /// 为 true 时调用方已认领该 key，需要执行生成并调用 `store`
    pub is_new: bool,
    /// 已完成的结果；pending 时为 None
    pub data: Option<T>,
}

/// 幂等记录的可见状态
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerStatus<T> {
    Pending,
    Completed(T),
    Failed,
}

/// 幂等账本
///
/// 存储错误一律向上传递，不会伪造结果。
#[derive(Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn IdempotencyStore>,
}

impl IdempotencyLedger {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }

    /// 原子查找或创建。新 key 会立即写入 pending 记录，
    /// 并发的重复请求只会看到 pending 而不会再次生成。
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        user_id: &str,
    ) -> Result<Lookup<T>, GenerationError> {
        self.lookup_at(key, user_id, Utc::now()).await
    }

    pub async fn lookup_at<T: DeserializeOwned>(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Lookup<T>, GenerationError> {
        let existing = match self.store.find_or_create(key, user_id, now).await? {
            FindOrCreate::Created(_) => {
                tracing::debug!("Claimed idempotency key {} for user {}", key, user_id);
                return Ok(Lookup {
                    is_new: true,
                    data: None,
                });
            }
            FindOrCreate::Existing(existing) => existing,
        };

        if !existing.is_owned_by(user_id) {
            tracing::warn!(
                "Idempotency key {} reused by user {} (owned by another user)",
                key,
                user_id
            );
            return Err(GenerationError::IdempotencyConflict);
        }

        match existing.status {
            IdempotencyStatus::Completed => Ok(Lookup {
                is_new: false,
                data: Some(decode_result(&existing)?),
            }),
            // failed 的记录在 find_or_create 中已被重新认领，这里只剩 pending
            IdempotencyStatus::Pending | IdempotencyStatus::Failed => Ok(Lookup {
                is_new: false,
                data: None,
            }),
        }
    }

    /// 写入生成结果，pending → completed 只发生一次
    pub async fn store<T: Serialize>(
        &self,
        key: &str,
        user_id: &str,
        data: &T,
    ) -> Result<(), GenerationError> {
        let serialized = serde_json::to_string(data)?;

        if self
            .store
            .complete(key, user_id, &serialized, Utc::now())
            .await?
        {
            return Ok(());
        }

        match self.store.find(key).await? {
            Some(existing) if !existing.is_owned_by(user_id) => {
                Err(GenerationError::IdempotencyConflict)
            }
            Some(_) => Err(GenerationError::AlreadyCompleted),
            None => Err(StoreError::Unavailable(format!(
                "idempotency record `{}` missing after write",
                key
            ))
            .into()),
        }
    }

    /// 生成失败时调用，允许之后使用同一个 key 重试
    pub async fn mark_failed(&self, key: &str, user_id: &str) -> Result<bool, GenerationError> {
        Ok(self.store.fail(key, user_id).await?)
    }

    /// 只读查询，供轮询接口使用
    pub async fn status<T: DeserializeOwned>(
        &self,
        key: &str,
        user_id: &str,
    ) -> Result<Option<LedgerStatus<T>>, GenerationError> {
        let Some(existing) = self.store.find(key).await? else {
            return Ok(None);
        };

        if !existing.is_owned_by(user_id) {
            return Err(GenerationError::IdempotencyConflict);
        }

        let status = match existing.status {
            IdempotencyStatus::Pending => LedgerStatus::Pending,
            IdempotencyStatus::Failed => LedgerStatus::Failed,
            IdempotencyStatus::Completed => LedgerStatus::Completed(decode_result(&existing)?),
        };
        Ok(Some(status))
    }
}

fn decode_result<T: DeserializeOwned>(request: &IdempotencyRequest) -> Result<T, GenerationError> {
    let raw = request.result.as_deref().ok_or_else(|| StoreError::Corrupt {
        key: request.idempotency_key.clone(),
        reason: "completed without a result".into(),
    })?;
    Ok(serde_json::from_str(raw)?)
}
