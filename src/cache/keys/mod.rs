//! 缓存键模块

/// 训练计划缓存键前缀
const BLUEPRINT_PREFIX: &str = "ai_workout:blueprint:";

/// 请求限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成训练计划缓存键，fingerprint 为参数哈希
pub fn blueprint_key(fingerprint: &str) -> String {
    format!("{}{}", BLUEPRINT_PREFIX, fingerprint)
}

/// 生成按客户端IP计数的限流键
pub fn rate_limit_key(client: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, client)
}
