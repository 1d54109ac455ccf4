// AI 训练计划生成
// 滑动窗口限流、幂等账本以及两者的编排

mod error;
pub mod generator;
pub mod idempotency;
pub mod model;
pub mod rate_limiter;
pub mod service;

pub use error::GenerationError;
pub use generator::{GeneratorError, HttpWorkoutGenerator, WorkoutGenerator};
pub use idempotency::{IdempotencyLedger, LedgerStatus, Lookup};
pub use model::{
    BlueprintDay, BlueprintExercise, ExperienceLevel, GenerationParams, WorkoutBlueprint,
};
pub use rate_limiter::SlidingWindowLimiter;
pub use service::{GenerationOutcome, GenerationPolicy, GenerationService};
