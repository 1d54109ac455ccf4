/// 缓存操作

// 训练计划缓存
pub mod blueprint;

// 请求限流计数
pub mod rate_limit;
