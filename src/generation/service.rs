use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::cache::BlueprintCache;
use crate::config::AiWorkoutConfig;
use crate::database::{IdempotencyStore, RateLimitStore};

use super::generator::WorkoutGenerator;
use super::idempotency::{IdempotencyLedger, LedgerStatus, Lookup};
use super::model::{GenerationParams, WorkoutBlueprint, validate_idempotency_key};
use super::rate_limiter::SlidingWindowLimiter;
use super::GenerationError;

/// 限流动作标签
pub const GENERATION_ACTION: &str = "ai_workout";

pub fn rate_limit_identifier(user_id: &str) -> String {
    format!("{}:{}", GENERATION_ACTION, user_id)
}

/// 每个用户的生成配额
#[derive(Debug, Clone, Copy)]
pub struct GenerationPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl From<&AiWorkoutConfig> for GenerationPolicy {
    fn from(config: &AiWorkoutConfig) -> Self {
        Self {
            limit: config.rate_limit,
            window: config.rate_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "blueprint", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// 本次请求生成（或命中计划缓存）
    Generated(WorkoutBlueprint),
    /// 相同幂等键之前已完成，直接返回保存的结果
    Replayed(WorkoutBlueprint),
}

impl GenerationOutcome {
    pub fn blueprint(&self) -> &WorkoutBlueprint {
        match self {
            GenerationOutcome::Generated(blueprint) | GenerationOutcome::Replayed(blueprint) => {
                blueprint
            }
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, GenerationOutcome::Replayed(_))
    }
}

/// 训练计划生成编排：限流 → 幂等查找或创建 → 缓存 / 外部生成 → 保存结果
///
/// 限流必须在幂等记账之前执行，否则不断更换幂等键即可绕过限流。
pub struct GenerationService {
    limiter: SlidingWindowLimiter,
    ledger: IdempotencyLedger,
    cache: Arc<dyn BlueprintCache>,
    generator: Arc<dyn WorkoutGenerator>,
    policy: GenerationPolicy,
}

impl GenerationService {
    pub fn new(
        rate_limits: Arc<dyn RateLimitStore>,
        requests: Arc<dyn IdempotencyStore>,
        cache: Arc<dyn BlueprintCache>,
        generator: Arc<dyn WorkoutGenerator>,
        policy: GenerationPolicy,
    ) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(rate_limits),
            ledger: IdempotencyLedger::new(requests),
            cache,
            generator,
            policy,
        }
    }

    pub async fn generate(
        &self,
        user_id: &str,
        idempotency_key: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutcome, GenerationError> {
        validate_idempotency_key(idempotency_key)?;
        params.validate()?;

        let rate = self
            .limiter
            .attempt(
                &rate_limit_identifier(user_id),
                GENERATION_ACTION,
                self.policy.limit,
                self.policy.window,
            )
            .await;
        if !rate.admitted {
            return Err(GenerationError::RateLimitExceeded {
                reset_time_ms: rate.reset_time_ms,
            });
        }

        let lookup: Lookup<WorkoutBlueprint> = self.ledger.lookup(idempotency_key, user_id).await?;
        if !lookup.is_new {
            return match lookup.data {
                Some(blueprint) => {
                    tracing::info!("Replaying stored blueprint for key {}", idempotency_key);
                    Ok(GenerationOutcome::Replayed(blueprint))
                }
                None => Err(GenerationError::PendingDuplicate),
            };
        }

        // 认领之后的生成与保存放在独立任务中执行，客户端断开导致当前 future 被丢弃时，
        // 任务仍会写入结果或将 key 标记为 failed，不会留下永久 pending 的记录
        let run = ClaimedRun {
            ledger: self.ledger.clone(),
            cache: self.cache.clone(),
            generator: self.generator.clone(),
            user_id: user_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
        };
        let params = params.clone();
        match tokio::spawn(async move { run.execute(&params).await }).await {
            Ok(result) => result.map(GenerationOutcome::Generated),
            Err(join_err) => {
                tracing::error!(
                    "Generation task for key {} aborted: {}",
                    idempotency_key,
                    join_err
                );
                release_claim(&self.ledger, idempotency_key, user_id).await;
                Err(join_err.into())
            }
        }
    }

    /// 查询幂等键状态，用于客户端轮询
    pub async fn status(
        &self,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<LedgerStatus<WorkoutBlueprint>>, GenerationError> {
        validate_idempotency_key(idempotency_key)?;
        self.ledger.status(idempotency_key, user_id).await
    }
}

/// 已认领幂等键之后的执行单元
struct ClaimedRun {
    ledger: IdempotencyLedger,
    cache: Arc<dyn BlueprintCache>,
    generator: Arc<dyn WorkoutGenerator>,
    user_id: String,
    idempotency_key: String,
}

impl ClaimedRun {
    async fn execute(self, params: &GenerationParams) -> Result<WorkoutBlueprint, GenerationError> {
        let result = self.generate_and_store(params).await;
        if let Err(e) = &result {
            tracing::error!(
                "Workout generation failed for key {}: {}",
                self.idempotency_key,
                e
            );
            release_claim(&self.ledger, &self.idempotency_key, &self.user_id).await;
        }
        result
    }

    async fn generate_and_store(
        &self,
        params: &GenerationParams,
    ) -> Result<WorkoutBlueprint, GenerationError> {
        let fingerprint = params.fingerprint(&self.user_id);
        let blueprint = match self.cache.get(&fingerprint).await {
            Some(blueprint) => blueprint,
            None => {
                let blueprint = self.generator.generate(params).await?;
                self.cache.put(&fingerprint, &blueprint).await;
                blueprint
            }
        };

        self.ledger
            .store(&self.idempotency_key, &self.user_id, &blueprint)
            .await?;
        tracing::info!(
            "Generated workout blueprint for user {} (key {})",
            self.user_id,
            self.idempotency_key
        );

        Ok(blueprint)
    }
}

/// 将 pending 记录标记为 failed，使同一个 key 可以重试
async fn release_claim(ledger: &IdempotencyLedger, idempotency_key: &str, user_id: &str) {
    if let Err(e) = ledger.mark_failed(idempotency_key, user_id).await {
        tracing::error!(
            "Failed to mark idempotency key {} as failed: {}",
            idempotency_key,
            e
        );
    }
}
