#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Notify;
use workout_backend::{
    AppState,
    cache::MemoryBlueprintCache,
    config::{AiWorkoutConfig, Config},
    database::{
        FindOrCreate, IdempotencyRequest, IdempotencyStore, MemoryIdempotencyStore,
        MemoryRateLimitStore, RateLimitResult, RateLimitStore, StoreError,
    },
    generation::{
        BlueprintDay, BlueprintExercise, ExperienceLevel, GenerationParams, GenerationPolicy,
        GenerationService, GeneratorError, WorkoutBlueprint, WorkoutGenerator,
    },
};

pub const JWT_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://postgres@localhost/workout_test".into(),
        database_max_connections: 1,
        redis_url: "redis://127.0.0.1/".into(),
        jwt_secret: JWT_SECRET.into(),
        api_base_uri: "/api".into(),
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        ai_workout: AiWorkoutConfig::default(),
    }
}

pub fn params() -> GenerationParams {
    GenerationParams {
        goal: "Build strength".into(),
        experience_level: ExperienceLevel::Beginner,
        days_per_week: 3,
        duration_minutes: 45,
        equipment: vec!["dumbbells".into()],
        focus_areas: vec!["legs".into()],
        notes: None,
    }
}

pub fn blueprint(name: &str) -> WorkoutBlueprint {
    WorkoutBlueprint {
        name: name.into(),
        description: Some("Full body strength".into()),
        days: vec![BlueprintDay {
            day: 1,
            title: "Lower body".into(),
            exercises: vec![BlueprintExercise {
                name: "Goblet squat".into(),
                sets: 3,
                reps: "8-12".into(),
                rest_seconds: 90,
                notes: None,
            }],
        }],
    }
}

/// 可控的生成服务替身
#[derive(Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    /// 设置后 generate 会等待 release 通知
    pub gate: Option<Gate>,
}

pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let generator = Self::default();
        generator.fail.store(true, Ordering::SeqCst);
        generator
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Gate {
                started: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkoutGenerator for FakeGenerator {
    async fn generate(&self, params: &GenerationParams) -> Result<WorkoutBlueprint, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GeneratorError::Upstream {
                status: 503,
                body: "model overloaded".into(),
            });
        }
        Ok(blueprint(&format!("{} #{}", params.goal, call)))
    }
}

/// 始终报错的限流存储
pub struct FailingRateLimitStore;

#[async_trait]
impl RateLimitStore for FailingRateLimitStore {
    async fn attempt(
        &self,
        _identifier: &str,
        _action: &str,
        _limit: u32,
        _window: Duration,
        _now: DateTime<Utc>,
    ) -> Result<RateLimitResult, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// 始终报错的幂等存储
pub struct FailingIdempotencyStore;

#[async_trait]
impl IdempotencyStore for FailingIdempotencyStore {
    async fn find_or_create(
        &self,
        _key: &str,
        _user_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<FindOrCreate, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find(&self, _key: &str) -> Result<Option<IdempotencyRequest>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn complete(
        &self,
        _key: &str,
        _user_id: &str,
        _result: &str,
        _now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn fail(&self, _key: &str, _user_id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// 第一次 complete 失败的幂等存储，其余操作委托给内存实现
#[derive(Default)]
pub struct FlakyCompleteStore {
    inner: MemoryIdempotencyStore,
    tripped: AtomicBool,
}

#[async_trait]
impl IdempotencyStore for FlakyCompleteStore {
    async fn find_or_create(
        &self,
        key: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FindOrCreate, StoreError> {
        self.inner.find_or_create(key, user_id, now).await
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRequest>, StoreError> {
        self.inner.find(key).await
    }

    async fn complete(
        &self,
        key: &str,
        user_id: &str,
        result: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.complete(key, user_id, result, now).await
    }

    async fn fail(&self, key: &str, user_id: &str) -> Result<bool, StoreError> {
        self.inner.fail(key, user_id).await
    }
}

pub struct Harness {
    pub service: Arc<GenerationService>,
    pub generator: Arc<FakeGenerator>,
    pub cache: Arc<MemoryBlueprintCache>,
}

pub fn harness_with(generator: FakeGenerator, limit: u32) -> Harness {
    harness_with_store(generator, limit, Arc::new(MemoryIdempotencyStore::new()))
}

pub fn harness_with_store(
    generator: FakeGenerator,
    limit: u32,
    requests: Arc<dyn IdempotencyStore>,
) -> Harness {
    let generator = Arc::new(generator);
    let cache = Arc::new(MemoryBlueprintCache::new());
    let service = GenerationService::new(
        Arc::new(MemoryRateLimitStore::new()),
        requests,
        cache.clone(),
        generator.clone(),
        GenerationPolicy {
            limit,
            window: Duration::milliseconds(60_000),
        },
    );
    Harness {
        service: Arc::new(service),
        generator,
        cache,
    }
}

pub fn harness() -> Harness {
    harness_with(FakeGenerator::new(), 5)
}

pub fn app_state(service: Arc<GenerationService>) -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    AppState {
        pool,
        config,
        generation: service,
    }
}

/// 设置了 DATABASE_URL 时连接测试数据库并执行迁移，否则返回 None
pub async fn pg_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

/// 测试之间共享数据库时使用的唯一标识
pub fn unique(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}
