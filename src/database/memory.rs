// 内存存储实现，用于本地开发和测试
// 每个操作在持有同一把锁的情况下完成，语义与 Postgres 实现一致

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::models::{IdempotencyStatus, RateLimitRecord, window_start};
use super::{
    FindOrCreate, IdempotencyRequest, IdempotencyStore, RateLimitResult, RateLimitStore,
    StoreError,
};

#[derive(Default)]
pub struct MemoryRateLimitStore {
    records: Mutex<HashMap<String, Vec<RateLimitRecord>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前跟踪的标识数量
    pub async fn identifier_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// 当前保存的记录数（包含尚未清理的过期记录）
    pub async fn record_count(&self, identifier: &str) -> usize {
        self.records
            .lock()
            .await
            .get(identifier)
            .map_or(0, |records| records.len())
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn attempt(
        &self,
        identifier: &str,
        action: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, StoreError> {
        let window_start = window_start(now, window);
        let mut records = self.records.lock().await;
        let mut entries = records.remove(identifier).unwrap_or_default();

        entries.retain(|record| record.created_at >= window_start);

        let oldest = entries.iter().map(|record| record.created_at).min();
        let result = RateLimitResult::evaluate(entries.len() as i64, oldest, limit, window, now);

        if result.admitted {
            entries.push(RateLimitRecord {
                identifier: identifier.to_string(),
                action: action.to_string(),
                created_at: now,
            });
        }

        // 清理后为空的标识不再保留
        if !entries.is_empty() {
            records.insert(identifier.to_string(), entries);
        }

        Ok(result)
    }
}

#[derive(Default)]
pub struct MemoryIdempotencyStore {
    requests: Mutex<HashMap<String, IdempotencyRequest>>,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn find_or_create(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FindOrCreate, StoreError> {
        let mut requests = self.requests.lock().await;

        match requests.get_mut(key) {
            Some(existing)
                if existing.status == IdempotencyStatus::Failed && existing.is_owned_by(user_id) =>
            {
                *existing = IdempotencyRequest::pending(key, user_id, now);
                Ok(FindOrCreate::Created(existing.clone()))
            }
            Some(existing) => Ok(FindOrCreate::Existing(existing.clone())),
            None => {
                let created = IdempotencyRequest::pending(key, user_id, now);
                requests.insert(key.to_string(), created.clone());
                Ok(FindOrCreate::Created(created))
            }
        }
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRequest>, StoreError> {
        Ok(self.requests.lock().await.get(key).cloned())
    }

    async fn complete(
        &self,
        key: &str,
        user_id: &str,
        result: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut requests = self.requests.lock().await;

        let entry = requests
            .entry(key.to_string())
            .or_insert_with(|| IdempotencyRequest::pending(key, user_id, now));

        if entry.status == IdempotencyStatus::Completed || !entry.is_owned_by(user_id) {
            return Ok(false);
        }

        entry.status = IdempotencyStatus::Completed;
        entry.result = Some(result.to_string());
        entry.completed_at = Some(now);
        Ok(true)
    }

    async fn fail(&self, key: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut requests = self.requests.lock().await;

        match requests.get_mut(key) {
            Some(entry)
                if entry.status == IdempotencyStatus::Pending && entry.is_owned_by(user_id) =>
            {
                entry.status = IdempotencyStatus::Failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_records_are_pruned_on_attempt() {
        let store = MemoryRateLimitStore::new();
        let window = Duration::seconds(10);
        let start = Utc::now();

        for _ in 0..3 {
            store.attempt("ai_workout:u1", "ai_workout", 3, window, start).await.unwrap();
        }
        assert_eq!(store.record_count("ai_workout:u1").await, 3);

        let later = start + Duration::seconds(11);
        let result = store
            .attempt("ai_workout:u1", "ai_workout", 3, window, later)
            .await
            .unwrap();
        assert!(result.admitted);
        assert_eq!(store.record_count("ai_workout:u1").await, 1);
    }

    #[tokio::test]
    async fn identifiers_with_no_live_records_are_dropped() {
        let store = MemoryRateLimitStore::new();
        let window = Duration::seconds(10);
        let start = Utc::now();

        store.attempt("ai_workout:u1", "ai_workout", 0, window, start).await.unwrap();
        assert_eq!(store.identifier_count().await, 0);

        store.attempt("ai_workout:u2", "ai_workout", 1, window, start).await.unwrap();
        assert_eq!(store.identifier_count().await, 1);

        let later = start + Duration::seconds(11);
        store.attempt("ai_workout:u2", "ai_workout", 0, window, later).await.unwrap();
        assert_eq!(store.identifier_count().await, 0);
    }

    #[tokio::test]
    async fn oversized_window_is_handled_without_overflow() {
        let store = MemoryRateLimitStore::new();
        let window = Duration::milliseconds(i64::MAX);
        let now = Utc::now();

        let first = store.attempt("ai_workout:u1", "ai_workout", 1, window, now).await.unwrap();
        assert!(first.admitted);
        let second = store.attempt("ai_workout:u1", "ai_workout", 1, window, now).await.unwrap();
        assert!(!second.admitted);
    }

    #[tokio::test]
    async fn failed_request_is_reclaimed_by_owner_only() {
        let store = MemoryIdempotencyStore::new();
        let now = Utc::now();

        store.find_or_create("key-0001", "u1", now).await.unwrap();
        assert!(store.fail("key-0001", "u1").await.unwrap());

        let other = store.find_or_create("key-0001", "u2", now).await.unwrap();
        assert!(matches!(other, FindOrCreate::Existing(ref r) if r.status == IdempotencyStatus::Failed));

        let owner = store.find_or_create("key-0001", "u1", now).await.unwrap();
        assert!(matches!(owner, FindOrCreate::Created(ref r) if r.status == IdempotencyStatus::Pending));
    }

    #[tokio::test]
    async fn complete_writes_result_once() {
        let store = MemoryIdempotencyStore::new();
        let now = Utc::now();

        store.find_or_create("key-0002", "u1", now).await.unwrap();
        assert!(store.complete("key-0002", "u1", "{\"a\":1}", now).await.unwrap());
        assert!(!store.complete("key-0002", "u1", "{\"a\":2}", now).await.unwrap());

        let stored = store.find("key-0002").await.unwrap().unwrap();
        assert_eq!(stored.result.as_deref(), Some("{\"a\":1}"));
        assert_eq!(stored.completed_at, Some(now));
    }
}
