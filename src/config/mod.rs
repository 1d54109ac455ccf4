use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub ai_workout: AiWorkoutConfig,
}

/// 限流窗口上限（30 天）
pub const MAX_RATE_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// AI 训练计划生成相关配置
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AiWorkoutConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub rate_limit: u32,
    pub rate_window_ms: i64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_ttl_secs: u64,
}

impl Default for AiWorkoutConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8088/v1/workouts/generate".into(),
            api_key: None,
            rate_limit: 5,
            rate_window_ms: 60_000,
            timeout_secs: 60,
            max_retries: 3,
            cache_ttl_secs: 86_400,
        }
    }
}

impl AiWorkoutConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("AI_WORKOUT_ENDPOINT").unwrap_or(defaults.endpoint),
            api_key: env::var("AI_WORKOUT_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            rate_limit: parse_or("AI_WORKOUT_RATE_LIMIT", defaults.rate_limit),
            rate_window_ms: window_ms_or(
                env::var("AI_WORKOUT_RATE_WINDOW_MS").ok().as_deref(),
                defaults.rate_window_ms,
            ),
            timeout_secs: parse_or("AI_WORKOUT_TIMEOUT_SECS", defaults.timeout_secs),
            max_retries: parse_or("AI_WORKOUT_MAX_RETRIES", defaults.max_retries),
            cache_ttl_secs: parse_or("AI_WORKOUT_CACHE_TTL", defaults.cache_ttl_secs),
        }
    }

    pub fn rate_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.rate_window_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// 解析限流窗口，非正数或超过上限时回退到默认值
fn window_ms_or(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(ms) if (1..=MAX_RATE_WINDOW_MS).contains(&ms) => ms,
        _ => {
            tracing::warn!(
                "Invalid AI_WORKOUT_RATE_WINDOW_MS `{}`, expected 1..={}; using {}",
                raw,
                MAX_RATE_WINDOW_MS,
                default
            );
            default
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            server_host: env::var("SERVER_HOST")?,
            server_port: parse_or("SERVER_PORT", 3000),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            ai_workout: AiWorkoutConfig::from_env(),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
