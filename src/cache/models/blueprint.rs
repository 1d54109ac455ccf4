use serde::{Deserialize, Serialize};

use crate::generation::WorkoutBlueprint;

/// 训练计划缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CachedBlueprint {
    pub blueprint: WorkoutBlueprint,
    pub cached_at: i64, // Unix timestamp
}
