use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::RateLimitCacheOperations,
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// 按客户端IP的全局请求限流（固定窗口，Redis 计数）
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

/// 解析客户端IP：x-real-ip → x-forwarded-for 第一个非空值 → 连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
                .map(str::to_string)
        })
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
        .trim()
        .to_string()
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let ip = client_ip(req.headers(), remote);

        let window_secs = self.config.rate_limit_window().as_secs();
        match RateLimitCacheOperations::increment(&self.redis, &ip, window_secs).await {
            Ok(count) if count > u64::from(self.config.rate_limit_requests) => {
                tracing::info!("Request throttled for {} ({} in window)", ip, count);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!("请求过于频繁，请在{}秒后重试", window_secs),
                    ),
                )
                    .into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                // Redis 不可用时放行
                tracing::warn!("Request throttle unavailable, admitting {}: {}", ip, e);
                next.run(req).await
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.7"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.8"));
        assert_eq!(client_ip(&headers, None), "10.0.0.7");
    }

    #[test]
    fn falls_back_to_first_forwarded_then_remote() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.8, 10.0.0.9"));
        assert_eq!(client_ip(&headers, None), "10.0.0.8");

        let remote: SocketAddr = "192.168.1.2:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(remote)), "192.168.1.2");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
