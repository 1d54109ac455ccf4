// 幂等请求实体

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 幂等请求状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    Pending,
    Completed,
    /// 生成失败，同一个 key 可以重新认领
    Failed,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::Pending => "pending",
            IdempotencyStatus::Completed => "completed",
            IdempotencyStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdempotencyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IdempotencyStatus::Pending),
            "completed" => Ok(IdempotencyStatus::Completed),
            "failed" => Ok(IdempotencyStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// 幂等请求，对应 idempotency_requests 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRequest {
    /// 客户端提供的幂等键，全局唯一
    pub idempotency_key: String,
    /// 幂等键的归属用户
    pub user_id: String,
    pub status: IdempotencyStatus,
    /// 序列化后的生成结果
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRequest {
    pub fn pending(key: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: key.to_string(),
            user_id: user_id.to_string(),
            status: IdempotencyStatus::Pending,
            result: None,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// 数据库原始行，status 以文本存储
#[derive(Debug, FromRow)]
pub(crate) struct IdempotencyRow {
    pub idempotency_key: String,
    pub user_id: String,
    pub status: String,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<IdempotencyRow> for IdempotencyRequest {
    type Error = String;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            idempotency_key: row.idempotency_key,
            user_id: row.user_id,
            result: row.result,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// 原子查找或创建的结果
#[derive(Debug, Clone)]
pub enum FindOrCreate {
    /// 新建了 pending 记录（或重新认领了失败的记录），调用方负责生成
    Created(IdempotencyRequest),
    /// 已存在的记录，可能属于其他用户
    Existing(IdempotencyRequest),
}
