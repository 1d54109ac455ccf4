use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, middleware::auth_middleware};

pub mod generation;
pub mod health;

/// 构建业务路由（不含全局限流与 CORS，由 main 负责）
pub fn app_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let protected_routes = Router::new()
        .route("/workouts/generate", post(generation::generate_workout))
        .route("/workouts/generate/{key}", get(generation::generation_status))
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .with_state(state)
}
