/// 缓存数据模型
pub mod blueprint;

pub use blueprint::CachedBlueprint;
