use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::RwLock;

use crate::cache::keys::blueprint_key;
use crate::cache::models::CachedBlueprint;
use crate::generation::WorkoutBlueprint;

/// 训练计划缓存
///
/// 缓存只是优化，幂等账本才是结果的来源；实现内部吞掉所有缓存错误。
#[async_trait]
pub trait BlueprintCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Option<WorkoutBlueprint>;
    async fn put(&self, fingerprint: &str, blueprint: &WorkoutBlueprint);
}

/// Redis 训练计划缓存
pub struct RedisBlueprintCache {
    redis: Arc<RedisClient>,
    ttl: u64,
}

impl RedisBlueprintCache {
    pub fn new(redis: Arc<RedisClient>, ttl: u64) -> Self {
        Self { redis, ttl }
    }
}

#[async_trait]
impl BlueprintCache for RedisBlueprintCache {
    async fn get(&self, fingerprint: &str) -> Option<WorkoutBlueprint> {
        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Blueprint cache unavailable: {}", e);
                return None;
            }
        };

        let key = blueprint_key(fingerprint);
        let cached: redis::RedisResult<Option<String>> = conn.get(&key).await;
        match cached {
            Ok(Some(json)) => match serde_json::from_str::<CachedBlueprint>(&json) {
                Ok(cached) => {
                    tracing::debug!("Get blueprint from cache: {}", key);
                    Some(cached.blueprint)
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cached blueprint {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read blueprint cache {}: {}", key, e);
                None
            }
        }
    }

    async fn put(&self, fingerprint: &str, blueprint: &WorkoutBlueprint) {
        let cached = CachedBlueprint {
            blueprint: blueprint.clone(),
            cached_at: chrono::Utc::now().timestamp(),
        };
        let Ok(json) = serde_json::to_string(&cached) else {
            return;
        };

        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let key = blueprint_key(fingerprint);
            let stored: Result<(), redis::RedisError> = conn.set_ex(&key, json, self.ttl).await;
            match stored {
                Ok(()) => tracing::debug!("Set blueprint to cache: {}", key),
                Err(e) => tracing::warn!("Failed to cache blueprint {}: {}", key, e),
            }
        }
    }
}

/// 进程内训练计划缓存，无过期
#[derive(Default)]
pub struct MemoryBlueprintCache {
    entries: RwLock<HashMap<String, WorkoutBlueprint>>,
}

impl MemoryBlueprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl BlueprintCache for MemoryBlueprintCache {
    async fn get(&self, fingerprint: &str) -> Option<WorkoutBlueprint> {
        self.entries.read().await.get(fingerprint).cloned()
    }

    async fn put(&self, fingerprint: &str, blueprint: &WorkoutBlueprint) {
        self.entries
            .write()
            .await
            .insert(fingerprint.to_string(), blueprint.clone());
    }
}
