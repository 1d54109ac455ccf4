use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_backend::{
    AppState,
    cache::RedisBlueprintCache,
    config::Config,
    database::{PgIdempotencyStore, PgRateLimitStore},
    generation::{GenerationPolicy, GenerationService, HttpWorkoutGenerator},
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'workout_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    // 设置 Redis 客户端
    let redis = Arc::new(
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"),
    );

    // 组装训练计划生成服务
    let generator = HttpWorkoutGenerator::new(&config.ai_workout)
        .expect("Failed to build generation HTTP client");
    let generation = GenerationService::new(
        Arc::new(PgRateLimitStore::new(pool.clone())),
        Arc::new(PgIdempotencyStore::new(pool.clone())),
        Arc::new(RedisBlueprintCache::new(
            redis.clone(),
            config.ai_workout.cache_ttl_secs,
        )),
        Arc::new(generator),
        GenerationPolicy::from(&config.ai_workout),
    );
    tracing::info!(
        "AI workout generation limited to {} requests per {} ms",
        config.ai_workout.rate_limit,
        config.ai_workout.rate_window_ms
    );

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        generation: Arc::new(generation),
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(redis, config.clone()));

    // 添加日志中间件和限流中间件
    let router = routes::app_router(state.clone())
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
