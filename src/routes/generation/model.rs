use serde::{Deserialize, Serialize};

use crate::generation::{GenerationOutcome, LedgerStatus, WorkoutBlueprint};

/// 客户端通过该请求头传递幂等键
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateWorkoutResponse {
    pub idempotency_key: String,
    /// 为 true 表示返回的是之前保存的结果
    pub replayed: bool,
    pub blueprint: WorkoutBlueprint,
}

impl GenerateWorkoutResponse {
    pub fn new(idempotency_key: String, outcome: GenerationOutcome) -> Self {
        let replayed = outcome.is_replay();
        let blueprint = match outcome {
            GenerationOutcome::Generated(blueprint) | GenerationOutcome::Replayed(blueprint) => {
                blueprint
            }
        };
        Self {
            idempotency_key,
            replayed,
            blueprint,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationStatusResponse {
    pub idempotency_key: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<WorkoutBlueprint>,
}

impl GenerationStatusResponse {
    pub fn new(idempotency_key: String, status: LedgerStatus<WorkoutBlueprint>) -> Self {
        let (status, blueprint) = match status {
            LedgerStatus::Pending => ("pending", None),
            LedgerStatus::Failed => ("failed", None),
            LedgerStatus::Completed(blueprint) => ("completed", Some(blueprint)),
        };
        Self {
            idempotency_key,
            status: status.to_string(),
            blueprint,
        }
    }
}
